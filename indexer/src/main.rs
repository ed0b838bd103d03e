use anyhow::{anyhow, Context, Result};
use booksim::{run, RunOptions};
use booksim_core::report::ReportPaths;
use booksim_core::tokenizer::{Algorithm, Tokenizer};
use booksim_crawler::{
    build_client, Acquirer, GutenbergMetadata, HttpTextSource, NoMetadata, Overrides, RetryPolicy, TextCache,
    DEFAULT_BASE_URL, USER_AGENT,
};
use clap::{Parser, Subcommand};
use reqwest::Url;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "booksim")]
#[command(about = "Find chronologically ordered pairs of similar books", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, vectorize and compare a range of books, then write the reports
    Run {
        /// Minimum cosine similarity to report, in [0, 1]. Prompted for when omitted
        #[arg(long)]
        threshold: Option<f64>,
        /// First book number
        #[arg(long, default_value_t = 1)]
        first: u32,
        /// Last book number (inclusive)
        #[arg(long, default_value_t = 50)]
        last: u32,
        /// Cache directory for downloaded texts
        #[arg(long, default_value = "books")]
        cache_dir: String,
        /// Output directory for the tab-separated reports
        #[arg(long, default_value = "reports")]
        output: String,
        /// Concurrent downloads
        #[arg(long, default_value_t = 8)]
        concurrency: usize,
        /// Attempts per book before the run fails
        #[arg(long, default_value_t = 5)]
        max_attempts: u32,
        /// Delay before the first retry, doubled after each failure
        #[arg(long, default_value_t = 500)]
        initial_backoff_ms: u64,
        /// Per-request timeout seconds
        #[arg(long, default_value_t = 60)]
        attempt_timeout_secs: u64,
        /// Give up if the whole run, fetching through reporting, takes longer than this
        #[arg(long)]
        deadline_secs: Option<u64>,
        /// JSON object mapping book numbers to the number whose text to use instead
        #[arg(long)]
        overrides: Option<String>,
        /// Stopword file, one word per line (built-in English list otherwise)
        #[arg(long)]
        stopwords: Option<String>,
        /// Apply English stemming to tokens
        #[arg(long, default_value_t = false)]
        stem: bool,
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,
        /// Skip catalog pages; every book is reported without title, author or date
        #[arg(long, default_value_t = false)]
        offline_metadata: bool,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            threshold,
            first,
            last,
            cache_dir,
            output,
            concurrency,
            max_attempts,
            initial_backoff_ms,
            attempt_timeout_secs,
            deadline_secs,
            overrides,
            stopwords,
            stem,
            base_url,
            offline_metadata,
        } => {
            if first == 0 || first > last {
                return Err(anyhow!("invalid book range {first}..={last}"));
            }
            let threshold = match threshold {
                Some(t) => t,
                None => prompt_threshold()?,
            };

            let mut tokenizer = match &stopwords {
                Some(path) => Tokenizer::from_stopword_file(path).with_context(|| format!("reading stopwords {path}"))?,
                None => Tokenizer::english(),
            };
            if stem {
                tokenizer = tokenizer.with_stemming(Algorithm::English);
            }
            let overrides = match &overrides {
                Some(path) => Overrides::from_json_file(path)?,
                None => Overrides::default(),
            };

            let timeout = Duration::from_secs(attempt_timeout_secs);
            let client = build_client(USER_AGENT, timeout)?;
            let base = Url::parse(&base_url).with_context(|| format!("invalid base url {base_url}"))?;
            let policy = RetryPolicy {
                max_attempts,
                initial_backoff: Duration::from_millis(initial_backoff_ms),
                attempt_timeout: timeout,
                ..RetryPolicy::default()
            };
            let acquirer = Arc::new(Acquirer::new(
                HttpTextSource::new(client.clone(), base.clone()),
                TextCache::new(&cache_dir),
                overrides,
                policy,
            ));
            let opts = RunOptions {
                ids: (first..=last).collect(),
                threshold,
                concurrency,
                deadline: deadline_secs.map(Duration::from_secs),
                output: ReportPaths::new(&output),
            };

            let rt = tokio::runtime::Runtime::new()?;
            let tokenizer = Arc::new(tokenizer);
            let summary = if offline_metadata {
                rt.block_on(run(acquirer, Arc::new(NoMetadata), tokenizer, opts))?
            } else {
                rt.block_on(run(acquirer, Arc::new(GutenbergMetadata::new(client, base)), tokenizer, opts))?
            };
            tracing::info!(
                documents = summary.documents,
                vocabulary = summary.vocabulary,
                similarities = summary.similarities,
                output = %output,
                "run complete"
            );
            Ok(())
        }
    }
}

fn prompt_threshold() -> Result<f64> {
    let mut stderr = io::stderr();
    write!(stderr, "Enter a threshold value: ")?;
    stderr.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    line.trim().parse::<f64>().with_context(|| format!("threshold {:?} is not a number", line.trim()))
}
