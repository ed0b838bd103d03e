//! Staged similarity run: acquire, tokenize, freeze the vocabulary, vectorize,
//! compare and report. Every stage finishes for all documents before the next
//! one starts.

use anyhow::{anyhow, Context, Result};
use booksim_core::report::{save_reports, ReportPaths};
use booksim_core::vectorize::{check_layout, vectorize_corpus};
use booksim_core::{DocId, DocMeta, Document, SimilarityEngine, SimilarityRecord, Tokenizer, VectorizedDocument, Vocabulary};
use booksim_crawler::{metadata_or_default, Acquirer, MetadataProvider, TextSource};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Empty,
    Fetching,
    Tokenized,
    VocabularyFrozen,
    Vectorized,
    Compared,
    Reported,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Empty => "empty",
            Stage::Fetching => "fetching",
            Stage::Tokenized => "tokenized",
            Stage::VocabularyFrozen => "vocabulary_frozen",
            Stage::Vectorized => "vectorized",
            Stage::Compared => "compared",
            Stage::Reported => "reported",
        };
        f.write_str(s)
    }
}

fn enter(stage: Stage, started: Instant) {
    tracing::info!(%stage, elapsed_ms = started.elapsed().as_millis() as u64, "stage");
}

pub struct RunOptions {
    pub ids: Vec<DocId>,
    pub threshold: f64,
    pub concurrency: usize,
    /// Bound on the whole run, from the first fetch to the last report.
    pub deadline: Option<Duration>,
    pub output: ReportPaths,
}

pub struct Analysis {
    pub vocabulary: Vocabulary,
    pub documents: Vec<VectorizedDocument>,
    pub records: Vec<SimilarityRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub documents: usize,
    pub vocabulary: usize,
    pub similarities: usize,
}

/// Text plus metadata for every id, in ascending id order.
pub async fn acquire<S, M>(
    acquirer: Arc<Acquirer<S>>,
    metadata: Arc<M>,
    ids: &[DocId],
    concurrency: usize,
) -> Result<Vec<(DocId, DocMeta, String)>>
where
    S: TextSource + 'static,
    M: MetadataProvider + 'static,
{
    let (texts, metas) = tokio::join!(
        acquirer.fetch_all(ids, concurrency),
        fetch_metadata(metadata, ids.to_vec(), concurrency),
    );
    let texts = texts?;
    let mut metas: HashMap<DocId, DocMeta> = metas.into_iter().collect();

    let out = texts
        .into_iter()
        .map(|(id, text)| (id, metas.remove(&id).unwrap_or_default(), text))
        .collect();
    Ok(out)
}

async fn fetch_metadata<M: MetadataProvider + 'static>(
    provider: Arc<M>,
    ids: Vec<DocId>,
    concurrency: usize,
) -> Vec<(DocId, DocMeta)> {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    for id in ids {
        let provider = provider.clone();
        let permits = permits.clone();
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            (id, metadata_or_default(provider.as_ref(), id).await)
        });
    }
    let mut out = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(pair) => out.push(pair),
            Err(e) => tracing::warn!(error = %e, "metadata task failed"),
        }
    }
    out
}

/// Tokenize every text with the run's tokenizer. Input order is kept.
pub fn tokenize_all(fetched: Vec<(DocId, DocMeta, String)>, tokenizer: &Tokenizer) -> Vec<Document> {
    fetched
        .into_par_iter()
        .map(|(id, meta, text)| Document::new(id, meta, &text, tokenizer))
        .collect()
}

/// Vocabulary, vectors and filtered pairs for an already tokenized corpus.
pub fn analyze(documents: Vec<Document>, threshold: f64) -> Result<Analysis> {
    let started = Instant::now();
    let engine = SimilarityEngine::new(threshold)?;

    let vocabulary = Vocabulary::build(documents.iter().map(Document::tokens))?;
    enter(Stage::VocabularyFrozen, started);
    tracing::info!(num_docs = documents.len(), vocab_size = vocabulary.len(), "vocabulary frozen");

    let documents = vectorize_corpus(documents, &vocabulary);
    check_layout(&documents, &vocabulary)?;
    enter(Stage::Vectorized, started);

    let records = engine.compare(&documents);
    enter(Stage::Compared, started);
    tracing::info!(pairs = records.len(), threshold, "similar pairs found");

    Ok(Analysis { vocabulary, documents, records })
}

/// Run every stage and write the reports, within `opts.deadline` when set.
pub async fn run<S, M>(acquirer: Arc<Acquirer<S>>, metadata: Arc<M>, tokenizer: Arc<Tokenizer>, opts: RunOptions) -> Result<RunSummary>
where
    S: TextSource + 'static,
    M: MetadataProvider + 'static,
{
    let started = Instant::now();
    if opts.ids.is_empty() {
        return Err(anyhow!("no documents requested"));
    }
    // Reject a bad threshold before any network traffic.
    SimilarityEngine::new(opts.threshold)?;
    enter(Stage::Empty, started);

    match opts.deadline {
        Some(limit) => tokio::time::timeout(limit, stages(acquirer, metadata, tokenizer, &opts, started))
            .await
            .map_err(|_| anyhow!("run deadline of {limit:?} exceeded"))?,
        None => stages(acquirer, metadata, tokenizer, &opts, started).await,
    }
}

async fn stages<S, M>(
    acquirer: Arc<Acquirer<S>>,
    metadata: Arc<M>,
    tokenizer: Arc<Tokenizer>,
    opts: &RunOptions,
    started: Instant,
) -> Result<RunSummary>
where
    S: TextSource + 'static,
    M: MetadataProvider + 'static,
{
    enter(Stage::Fetching, started);
    let fetched = acquire(acquirer, metadata, &opts.ids, opts.concurrency).await?;

    let threshold = opts.threshold;
    let analysis = tokio::task::spawn_blocking(move || {
        let documents = tokenize_all(fetched, &tokenizer);
        enter(Stage::Tokenized, started);
        analyze(documents, threshold)
    })
    .await
    .context("analysis task")??;

    let docs: Vec<Document> = analysis.documents.into_iter().map(|d| d.document).collect();
    save_reports(&opts.output, &docs, &analysis.records)
        .with_context(|| format!("writing reports to {}", opts.output.root.display()))?;
    enter(Stage::Reported, started);

    Ok(RunSummary {
        documents: docs.len(),
        vocabulary: analysis.vocabulary.len(),
        similarities: analysis.records.len(),
    })
}
