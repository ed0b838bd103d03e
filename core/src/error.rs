use crate::DocId;

/// Fatal corpus-level errors. Any of these aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("empty corpus: no tokens left in any of {documents} documents after normalization")]
    EmptyCorpus { documents: usize },

    #[error("similarity threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),

    #[error("vector for document {id} has length {actual}, vocabulary has {expected} tokens")]
    VectorLength { id: DocId, actual: usize, expected: usize },
}
