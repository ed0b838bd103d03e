//! Pairwise cosine similarity with threshold and chronological filtering.
//!
//! A pair `(source, target)` is reported when both vectors are non-zero, the
//! score reaches the threshold, and the source was published no later than the
//! target. Pairs involving a document without a publication date are never
//! reported.

use crate::error::CorpusError;
use crate::vectorize::{TermVector, VectorizedDocument};
use crate::DocId;
use rayon::prelude::*;
use time::Date;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityRecord {
    pub source: DocId,
    pub target: DocId,
    pub score: f64,
}

/// Raw cosine similarity. Symmetric; 0 when either vector has zero norm.
pub fn cosine(a: &TermVector, b: &TermVector) -> f64 {
    score(a.dot(b), a.norm_sq(), b.norm_sq())
}

fn score(dot: u64, norm_sq_a: u64, norm_sq_b: u64) -> f64 {
    if norm_sq_a == 0 || norm_sq_b == 0 {
        return 0.0;
    }
    // One sqrt over the product keeps identical vectors at exactly 1.0.
    let s = dot as f64 / (norm_sq_a as f64 * norm_sq_b as f64).sqrt();
    s.clamp(0.0, 1.0)
}

fn chronological(source: Option<Date>, target: Option<Date>) -> bool {
    matches!((source, target), (Some(s), Some(t)) if s <= t)
}

pub struct SimilarityEngine {
    threshold: f64,
}

impl SimilarityEngine {
    pub fn new(threshold: f64) -> Result<Self, CorpusError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(CorpusError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    /// Compare every ordered pair of `docs`. Output is ordered by source position,
    /// then target position, whatever order the rows finish in.
    pub fn compare(&self, docs: &[VectorizedDocument]) -> Vec<SimilarityRecord> {
        let norms: Vec<u64> = docs.iter().map(|d| d.vector.norm_sq()).collect();
        let rows: Vec<Vec<SimilarityRecord>> = (0..docs.len())
            .into_par_iter()
            .map(|i| self.row(docs, &norms, i))
            .collect();
        let records: Vec<SimilarityRecord> = rows.into_iter().flatten().collect();
        tracing::debug!(
            documents = docs.len(),
            reported = records.len(),
            threshold = self.threshold,
            "compared all pairs"
        );
        records
    }

    fn row(&self, docs: &[VectorizedDocument], norms: &[u64], i: usize) -> Vec<SimilarityRecord> {
        let src = &docs[i];
        let src_date = src.document.meta().published;
        if norms[i] == 0 || src_date.is_none() {
            return Vec::new();
        }
        let mut out = Vec::new();
        for (j, dst) in docs.iter().enumerate() {
            if i == j || norms[j] == 0 {
                continue;
            }
            if !chronological(src_date, dst.document.meta().published) {
                continue;
            }
            let s = score(src.vector.dot(&dst.vector), norms[i], norms[j]);
            if s >= self.threshold {
                out.push(SimilarityRecord { source: src.document.id(), target: dst.document.id(), score: s });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_norm_scores_zero() {
        let a = TermVector::from_counts(vec![0, 0]);
        let b = TermVector::from_counts(vec![1, 3]);
        assert_eq!(cosine(&a, &b), 0.0);
        assert_eq!(cosine(&a, &a), 0.0);
    }

    #[test]
    fn identical_vectors_score_exactly_one() {
        let a = TermVector::from_counts(vec![3, 1, 4, 1, 5, 9, 2, 6]);
        assert_eq!(cosine(&a, &a), 1.0);
    }

    #[test]
    fn threshold_outside_unit_interval_rejected() {
        assert!(SimilarityEngine::new(-0.1).is_err());
        assert!(SimilarityEngine::new(1.5).is_err());
        assert!(SimilarityEngine::new(f64::NAN).is_err());
        assert!(SimilarityEngine::new(0.0).is_ok());
        assert!(SimilarityEngine::new(1.0).is_ok());
    }

    #[test]
    fn dateless_side_fails_chronology() {
        let d = Date::from_calendar_date(1900, time::Month::January, 1).unwrap();
        assert!(chronological(Some(d), Some(d)));
        assert!(!chronological(None, Some(d)));
        assert!(!chronological(Some(d), None));
    }
}
