pub mod error;
pub mod report;
pub mod similarity;
pub mod tokenizer;
pub mod vectorize;
pub mod vocab;

pub use error::CorpusError;
pub use similarity::{SimilarityEngine, SimilarityRecord};
pub use tokenizer::Tokenizer;
pub use vectorize::{TermVector, VectorizedDocument};
pub use vocab::{Vocabulary, VocabularyBuilder};

use time::Date;

pub type DocId = u32;

/// Bibliographic metadata for a document. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocMeta {
    pub title: Option<String>,
    pub author: Option<String>,
    pub author_birth_year: Option<i32>,
    /// Required for a document to take part in chronologically filtered output.
    pub published: Option<Date>,
}

/// A fetched and tokenized document. Immutable once built.
#[derive(Debug, Clone)]
pub struct Document {
    id: DocId,
    meta: DocMeta,
    tokens: Vec<String>,
}

impl Document {
    /// Build a document, deriving its token list from `text` exactly once.
    pub fn new(id: DocId, meta: DocMeta, text: &str, tokenizer: &Tokenizer) -> Self {
        Self { id, meta, tokens: tokenizer.tokenize(text) }
    }

    /// Build a document from an already tokenized text.
    pub fn from_tokens(id: DocId, meta: DocMeta, tokens: Vec<String>) -> Self {
        Self { id, meta, tokens }
    }

    pub fn id(&self) -> DocId { self.id }
    pub fn meta(&self) -> &DocMeta { &self.meta }
    pub fn tokens(&self) -> &[String] { &self.tokens }
}
