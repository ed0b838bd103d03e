use crate::error::CorpusError;
use crate::vocab::Vocabulary;
use crate::Document;
use rayon::prelude::*;
use std::collections::HashMap;

/// Dense term-frequency vector. Entry `k` counts the vocabulary's `k`-th token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermVector(Vec<u32>);

impl TermVector {
    pub fn from_counts(counts: Vec<u32>) -> Self { Self(counts) }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn as_slice(&self) -> &[u32] { &self.0 }

    /// Squared Euclidean norm, exact.
    pub fn norm_sq(&self) -> u64 {
        self.0.iter().map(|&c| c as u64 * c as u64).sum()
    }

    pub fn dot(&self, other: &TermVector) -> u64 {
        self.0.iter().zip(other.0.iter()).map(|(&a, &b)| a as u64 * b as u64).sum()
    }

    pub fn is_zero(&self) -> bool { self.0.iter().all(|&c| c == 0) }
}

/// A document paired with its vector over a frozen vocabulary.
#[derive(Debug, Clone)]
pub struct VectorizedDocument {
    pub document: Document,
    pub vector: TermVector,
}

/// Count `tokens` over `vocab`. Tokens outside the vocabulary are ignored.
pub fn vectorize(tokens: &[String], vocab: &Vocabulary) -> TermVector {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for t in tokens {
        *counts.entry(t.as_str()).or_insert(0) += 1;
    }
    let mut dense = vec![0u32; vocab.len()];
    for (token, count) in counts {
        match vocab.position(token) {
            Some(k) => dense[k] = count,
            None => tracing::debug!(token, "token outside vocabulary"),
        }
    }
    TermVector(dense)
}

/// Vectorize every document against `vocab`, in parallel, keeping input order.
pub fn vectorize_corpus(documents: Vec<Document>, vocab: &Vocabulary) -> Vec<VectorizedDocument> {
    documents
        .into_par_iter()
        .map(|document| {
            let vector = vectorize(document.tokens(), vocab);
            VectorizedDocument { document, vector }
        })
        .collect()
}

/// Check that every vector shares the vocabulary's layout.
pub fn check_layout(docs: &[VectorizedDocument], vocab: &Vocabulary) -> Result<(), CorpusError> {
    for d in docs {
        if d.vector.len() != vocab.len() {
            return Err(CorpusError::VectorLength {
                id: d.document.id(),
                actual: d.vector.len(),
                expected: vocab.len(),
            });
        }
    }
    Ok(())
}
