use crate::error::CorpusError;
use std::collections::{BTreeSet, HashMap};

/// The corpus-wide token coordinate system: distinct tokens in lexicographic
/// order, each with a stable position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    tokens: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Vocabulary {
    /// Union the token lists and freeze the result. Input order does not matter.
    pub fn build<I, T>(token_lists: I) -> Result<Self, CorpusError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[String]>,
    {
        let mut builder = VocabularyBuilder::new();
        for tokens in token_lists {
            builder.add(tokens.as_ref());
        }
        builder.finish()
    }

    pub fn len(&self) -> usize { self.tokens.len() }
    pub fn is_empty(&self) -> bool { self.tokens.is_empty() }
    pub fn tokens(&self) -> &[String] { &self.tokens }
    pub fn position(&self, token: &str) -> Option<usize> { self.positions.get(token).copied() }
    pub fn token(&self, position: usize) -> Option<&str> { self.tokens.get(position).map(String::as_str) }
}

/// Accumulating phase of a [`Vocabulary`]. Nothing can be looked up until
/// [`VocabularyBuilder::finish`] freezes it.
#[derive(Debug, Default)]
pub struct VocabularyBuilder {
    seen: BTreeSet<String>,
    documents: usize,
}

impl VocabularyBuilder {
    pub fn new() -> Self { Self::default() }

    /// Add one document's token list.
    pub fn add(&mut self, tokens: &[String]) {
        self.documents += 1;
        for t in tokens {
            if !self.seen.contains(t) {
                self.seen.insert(t.clone());
            }
        }
    }

    pub fn finish(self) -> Result<Vocabulary, CorpusError> {
        if self.seen.is_empty() {
            return Err(CorpusError::EmptyCorpus { documents: self.documents });
        }
        // BTreeSet iterates in byte order, which for UTF-8 is code point order.
        let tokens: Vec<String> = self.seen.into_iter().collect();
        let positions = tokens.iter().enumerate().map(|(i, t)| (t.clone(), i)).collect();
        tracing::debug!(documents = self.documents, size = tokens.len(), "vocabulary frozen");
        Ok(Vocabulary { tokens, positions })
    }
}
