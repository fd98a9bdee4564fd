//! Term scoring functions.

use serde::{Deserialize, Serialize};

use crate::index::store::FieldIndex;

/// How a (term frequency, document length) pair becomes a score.
///
/// Every variant is monotonic in term frequency, decreasing in document
/// length, and deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Similarity {
    /// `tf / (1 + doc_len)`.
    #[default]
    LengthNorm,
    /// Okapi BM25.
    Bm25 { k1: f32, b: f32 },
}

impl Similarity {
    /// BM25 with the usual `k1 = 1.2`, `b = 0.75`.
    pub fn bm25() -> Self {
        Similarity::Bm25 { k1: 1.2, b: 0.75 }
    }

    /// A scorer for one term (or phrase) of `field` that occurs in
    /// `doc_freq` of `doc_count` documents.
    pub fn term_scorer(&self, field: &FieldIndex, doc_count: u32, doc_freq: usize) -> TermScorer {
        match *self {
            Similarity::LengthNorm => TermScorer::LengthNorm,
            Similarity::Bm25 { k1, b } => {
                let n = doc_count as f32;
                let df = doc_freq as f32;
                let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                TermScorer::Bm25 {
                    k1,
                    b,
                    idf,
                    avg_len: field.average_length(),
                }
            }
        }
    }
}

/// Per-term scoring state produced by [`Similarity::term_scorer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TermScorer {
    LengthNorm,
    Bm25 { k1: f32, b: f32, idf: f32, avg_len: f32 },
}

impl TermScorer {
    pub fn score(&self, term_freq: u32, doc_len: u32) -> f32 {
        let tf = term_freq as f32;
        match *self {
            TermScorer::LengthNorm => tf / (1.0 + doc_len as f32),
            TermScorer::Bm25 {
                k1,
                b,
                idf,
                avg_len,
            } => {
                let norm = if avg_len > 0.0 {
                    1.0 - b + b * doc_len as f32 / avg_len
                } else {
                    1.0
                };
                idf * tf * (k1 + 1.0) / (tf + k1 * norm)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::builder::{Document, IndexBuilder};

    fn field_index() -> crate::index::store::PostingsStore {
        let mut builder = IndexBuilder::new();
        builder
            .add_document(Document::new().add_tokens("body", ["a", "b"]))
            .unwrap();
        builder
            .add_document(Document::new().add_tokens("body", ["a", "b", "c", "d"]))
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_length_norm() {
        let store = field_index();
        let scorer = Similarity::LengthNorm.term_scorer(store.field("body").unwrap(), 2, 2);
        assert_eq!(scorer.score(1, 1), 0.5);
        assert_eq!(scorer.score(2, 3), 0.5);
    }

    #[test]
    fn test_monotonic_in_tf_and_inverse_in_length() {
        let store = field_index();
        let field = store.field("body").unwrap();
        for similarity in [Similarity::LengthNorm, Similarity::bm25()] {
            let scorer = similarity.term_scorer(field, 2, 1);
            assert!(scorer.score(2, 4) > scorer.score(1, 4), "{similarity:?}");
            assert!(scorer.score(1, 2) > scorer.score(1, 8), "{similarity:?}");
        }
    }

    #[test]
    fn test_bm25_rare_terms_score_higher() {
        let store = field_index();
        let field = store.field("body").unwrap();
        let rare = Similarity::bm25().term_scorer(field, 2, 1);
        let common = Similarity::bm25().term_scorer(field, 2, 2);
        assert!(rare.score(1, 3) > common.score(1, 3));
    }

    #[test]
    fn test_serde_form() {
        let json = serde_json::to_string(&Similarity::bm25()).unwrap();
        assert_eq!(json, r#"{"type":"bm25","k1":1.2,"b":0.75}"#);
        let parsed: Similarity = serde_json::from_str(r#"{"type":"length_norm"}"#).unwrap();
        assert_eq!(parsed, Similarity::LengthNorm);
    }
}
