use anyhow::{anyhow, Context, Result};
use booksim_crawler::{build_client, Acquirer, HttpTextSource, Overrides, RetryPolicy, TextCache, DEFAULT_BASE_URL, USER_AGENT};
use clap::Parser;
use reqwest::Url;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Download book texts into the local cache")]
struct Cli {
    /// First book number
    #[arg(long, default_value_t = 1)]
    first: u32,
    /// Last book number (inclusive)
    #[arg(long, default_value_t = 50)]
    last: u32,
    /// Cache directory, one bookN.txt per book
    #[arg(long, default_value = "books")]
    cache_dir: String,
    /// Number of concurrent downloads
    #[arg(long, default_value_t = 8)]
    concurrency: usize,
    /// Attempts per book before giving up
    #[arg(long, default_value_t = 5)]
    max_attempts: u32,
    /// Delay before the first retry, doubled after each failure
    #[arg(long, default_value_t = 500)]
    initial_backoff_ms: u64,
    /// Per-request timeout seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
    /// JSON object mapping book numbers to the number whose text to use instead
    #[arg(long)]
    overrides: Option<String>,
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();
    if args.first == 0 || args.first > args.last {
        return Err(anyhow!("invalid book range {}..={}", args.first, args.last));
    }

    let timeout = Duration::from_secs(args.timeout_secs);
    let client = build_client(USER_AGENT, timeout)?;
    let base = Url::parse(&args.base_url).with_context(|| format!("invalid base url {}", args.base_url))?;
    let overrides = match &args.overrides {
        Some(path) => Overrides::from_json_file(path)?,
        None => Overrides::default(),
    };
    let policy = RetryPolicy {
        max_attempts: args.max_attempts,
        initial_backoff: Duration::from_millis(args.initial_backoff_ms),
        attempt_timeout: timeout,
        ..RetryPolicy::default()
    };
    let acquirer = Arc::new(Acquirer::new(
        HttpTextSource::new(client, base),
        TextCache::new(&args.cache_dir),
        overrides,
        policy,
    ));

    let ids: Vec<u32> = (args.first..=args.last).collect();
    let start = Instant::now();
    let fetched = acquirer.fetch_all(&ids, args.concurrency).await?;
    let bytes: usize = fetched.iter().map(|(_, t)| t.len()).sum();
    eprintln!(
        "done: books={} bytes={} elapsed={:.1}s -> {}",
        fetched.len(),
        bytes,
        start.elapsed().as_secs_f64(),
        &args.cache_dir
    );
    Ok(())
}
