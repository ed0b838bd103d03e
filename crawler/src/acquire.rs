use crate::cache::TextCache;
use crate::error::{FetchError, SourceError};
use crate::source::{Overrides, TextSource};
use booksim_core::DocId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tokio::time::{sleep, timeout};

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. At least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound on a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1u32 << exp).min(self.max_backoff)
    }
}

/// Fetches document text through the cache, retrying transient source failures.
pub struct Acquirer<S> {
    source: S,
    cache: TextCache,
    overrides: Overrides,
    policy: RetryPolicy,
}

impl<S: TextSource> Acquirer<S> {
    pub fn new(source: S, cache: TextCache, overrides: Overrides, policy: RetryPolicy) -> Self {
        Self { source, cache, overrides, policy }
    }

    pub fn cache(&self) -> &TextCache { &self.cache }
    pub fn source(&self) -> &S { &self.source }

    /// Return the text for `id`, from the cache when present. A miss fetches from
    /// the source (following any override) and writes the entry once.
    pub async fn fetch(&self, id: DocId) -> Result<String, FetchError> {
        let _guard = self.cache.lock(id).await;
        if let Some(text) = self.cache.read(id).await.map_err(|source| FetchError::Cache { id, source })? {
            tracing::debug!(id, "cache hit");
            return Ok(text);
        }

        let resolved = self.overrides.resolve(id);
        if resolved != id {
            tracing::info!(id, resolved, "fetching through override");
        }
        let text = self.fetch_with_retry(id, resolved).await?;
        self.cache.write(id, &text).await.map_err(|source| FetchError::Cache { id, source })?;
        tracing::info!(id, bytes = text.len(), "downloaded");
        Ok(text)
    }

    async fn fetch_with_retry(&self, id: DocId, resolved: DocId) -> Result<String, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match timeout(self.policy.attempt_timeout, self.source.fetch_text(resolved)).await {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(e)) => e,
                Err(_) => SourceError::Transient(format!("attempt timed out after {:?}", self.policy.attempt_timeout)),
            };
            if !err.is_transient() {
                tracing::warn!(id, resolved, error = %err, "not retrying");
                return Err(FetchError::Unavailable { id, resolved, reason: err.to_string() });
            }
            if attempt >= max_attempts {
                tracing::warn!(id, attempts = attempt, error = %err, "giving up");
                return Err(FetchError::Exhausted { id, attempts: attempt, last: err });
            }
            let delay = self.policy.backoff(attempt);
            tracing::debug!(id, attempt, ?delay, error = %err, "download failed, retrying");
            sleep(delay).await;
        }
    }
}

impl<S: TextSource + 'static> Acquirer<S> {
    /// Fetch every id with at most `concurrency` in flight. Results come back in
    /// ascending id order. The first failure cancels the remaining fetches.
    pub async fn fetch_all(self: Arc<Self>, ids: &[DocId], concurrency: usize) -> Result<Vec<(DocId, String)>, FetchError> {
        let permits = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut owners: HashMap<task::Id, DocId> = HashMap::with_capacity(ids.len());
        for &id in ids {
            let this = self.clone();
            let permits = permits.clone();
            let handle = tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.map_err(|e| FetchError::Task { id, reason: e.to_string() })?;
                this.fetch(id).await
            });
            owners.insert(handle.id(), id);
        }

        let mut out = Vec::with_capacity(ids.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            // Every spawned task is in `owners`, including one that panicked.
            let (task_id, fetched) = joined.map_err(|e| FetchError::Task { id: owners[&e.id()], reason: e.to_string() })?;
            out.push((owners[&task_id], fetched?));
            if out.len() % 10 == 0 {
                tracing::info!(done = out.len(), total = ids.len(), "fetch progress");
            }
        }
        out.sort_by_key(|(id, _)| *id);
        Ok(out)
    }
}
