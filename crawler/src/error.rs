use booksim_core::DocId;
use std::io;

/// Failure reported by a [`crate::TextSource`] for a single attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// Worth retrying: timeouts, connection errors, 408/429/5xx.
    #[error("transient: {0}")]
    Transient(String),
    /// Retrying will not help, e.g. 404.
    #[error("permanent: {0}")]
    Permanent(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool { matches!(self, Self::Transient(_)) }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("gave up on document {id} after {attempts} attempts: {last}")]
    Exhausted { id: DocId, attempts: u32, last: SourceError },

    #[error("document {id} is unavailable (requested as {resolved}): {reason}")]
    Unavailable { id: DocId, resolved: DocId, reason: String },

    #[error("cache entry for document {id}: {source}")]
    Cache {
        id: DocId,
        #[source]
        source: io::Error,
    },

    #[error("fetch task for document {id} failed: {reason}")]
    Task { id: DocId, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("no metadata found for document {id}: {reason}")]
    NotFound { id: DocId, reason: String },
}
