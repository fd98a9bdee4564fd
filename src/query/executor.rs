//! Query execution against a [`PostingsStore`].
//!
//! Every node evaluates to a list of `(doc_id, score)` sorted by document, so
//! boolean operators are linear merges. Only the final list is ranked.

use std::time::Instant;

use crate::error::{QuarryError, Result};
use crate::index::posting::{DocId, PostingList};
use crate::index::store::{FieldIndex, PostingsStore};
use crate::query::collector::{ScoreHit, TopHitsCollector};
use crate::query::node::{BooleanOperator, QueryNode};
use crate::query::similarity::Similarity;
use crate::query::wildcard::WildcardPattern;

/// Matching documents with scores, ascending by document.
type ScoredDocs = Vec<(DocId, f32)>;

pub const DEFAULT_MAX_WILDCARD_EXPANSIONS: usize = 1024;

/// Executes query trees against one postings store.
#[derive(Debug, Clone)]
pub struct Executor<'a> {
    store: &'a PostingsStore,
    similarity: Similarity,
    max_expansions: usize,
    deadline: Option<Instant>,
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a PostingsStore) -> Self {
        Executor {
            store,
            similarity: Similarity::default(),
            max_expansions: DEFAULT_MAX_WILDCARD_EXPANSIONS,
            deadline: None,
        }
    }

    pub fn with_similarity(mut self, similarity: Similarity) -> Self {
        self.similarity = similarity;
        self
    }

    /// Upper bound on the dictionary terms one wildcard expands to.
    pub fn with_max_expansions(mut self, max_expansions: usize) -> Self {
        self.max_expansions = max_expansions;
        self
    }

    /// Give up with `Timeout` once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run `node` against `field` and return at most `top_n` hits, best first.
    ///
    /// A field missing from the index produces no hits.
    pub fn execute(&self, node: &QueryNode, field: &str, top_n: usize) -> Result<Vec<ScoreHit>> {
        node.validate()?;

        let Some(field_index) = self.store.field(field) else {
            log::debug!("Field '{field}' is not indexed; no hits");
            return Ok(Vec::new());
        };
        if top_n == 0 {
            return Ok(Vec::new());
        }

        let docs = self.evaluate(node, field_index)?;
        let mut collector = TopHitsCollector::new(top_n);
        for (doc_id, score) in docs {
            collector.collect(ScoreHit::new(doc_id, score));
        }
        log::debug!(
            "Query '{node}' on field '{field}' matched {} documents",
            collector.total_hits()
        );
        Ok(collector.into_hits())
    }

    fn check_deadline(&self) -> Result<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(QuarryError::Timeout),
            _ => Ok(()),
        }
    }

    fn evaluate(&self, node: &QueryNode, field: &FieldIndex) -> Result<ScoredDocs> {
        self.check_deadline()?;
        match node {
            QueryNode::Term(term) => Ok(field
                .postings(term)
                .map(|list| self.score_term(field, list))
                .unwrap_or_default()),
            QueryNode::Phrase(terms) => self.evaluate_phrase(terms, field),
            QueryNode::Wildcard(pattern) => self.evaluate_wildcard(pattern, field),
            QueryNode::Boolean { op, children } => self.evaluate_boolean(*op, children, field),
        }
    }

    fn score_term(&self, field: &FieldIndex, list: &PostingList) -> ScoredDocs {
        let scorer = self
            .similarity
            .term_scorer(field, self.store.doc_count(), list.doc_freq());
        list.iter()
            .map(|p| (p.doc_id, scorer.score(p.term_freq, field.doc_length(p.doc_id))))
            .collect()
    }

    fn evaluate_phrase(&self, terms: &[String], field: &FieldIndex) -> Result<ScoredDocs> {
        if let [term] = terms {
            return self.evaluate(&QueryNode::Term(term.clone()), field);
        }
        if !field.has_positions() {
            return Err(QuarryError::invalid_query(
                "phrase query on a field indexed without positions",
            ));
        }

        let mut lists = Vec::with_capacity(terms.len());
        for term in terms {
            match field.postings(term) {
                Some(list) => lists.push(list),
                None => return Ok(Vec::new()),
            }
        }

        // Drive from the rarest term.
        let Some(driver) = lists.iter().min_by_key(|list| list.doc_freq()) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<(DocId, u32)> = Vec::new();
        'docs: for candidate in driver.iter() {
            let mut postings = Vec::with_capacity(lists.len());
            for list in &lists {
                match list.get(candidate.doc_id) {
                    Some(posting) => postings.push(posting),
                    None => continue 'docs,
                }
            }

            let Some((first, rest)) = postings.split_first() else {
                continue;
            };
            let contiguous = first.positions.iter().any(|&start| {
                rest.iter().enumerate().all(|(i, posting)| {
                    start
                        .checked_add(i as u32 + 1)
                        .is_some_and(|pos| posting.positions.binary_search(&pos).is_ok())
                })
            });
            if contiguous {
                let term_freq: u32 = postings.iter().map(|p| p.term_freq).sum();
                matches.push((candidate.doc_id, term_freq));
            }
        }

        let scorer = self
            .similarity
            .term_scorer(field, self.store.doc_count(), matches.len());
        Ok(matches
            .into_iter()
            .map(|(doc_id, tf)| (doc_id, scorer.score(tf, field.doc_length(doc_id))))
            .collect())
    }

    fn evaluate_wildcard(&self, pattern: &str, field: &FieldIndex) -> Result<ScoredDocs> {
        let pattern = WildcardPattern::new(pattern)?;
        let ordinals = pattern.expand(field, self.max_expansions);

        let mut scored: ScoredDocs = Vec::new();
        for ordinal in ordinals {
            self.check_deadline()?;
            if let Some(list) = field.postings_by_ordinal(ordinal) {
                scored.extend(self.score_term(field, list));
            }
        }
        Ok(sum_by_doc(scored))
    }

    fn evaluate_boolean(
        &self,
        op: BooleanOperator,
        children: &[QueryNode],
        field: &FieldIndex,
    ) -> Result<ScoredDocs> {
        let misplaced_not = || {
            let rendered = QueryNode::Boolean {
                op,
                children: children.to_vec(),
            }
            .to_string();
            QuarryError::syntax("NOT must be combined with a positive clause", &rendered, 0)
        };
        if op == BooleanOperator::Not {
            return Err(misplaced_not());
        }

        let mut positive: Option<ScoredDocs> = None;
        let mut excluded: Vec<ScoredDocs> = Vec::new();
        for child in children {
            match child {
                QueryNode::Boolean {
                    op: BooleanOperator::Not,
                    children: negated,
                } => {
                    for node in negated {
                        excluded.push(self.evaluate(node, field)?);
                    }
                }
                _ => {
                    let docs = self.evaluate(child, field)?;
                    positive = Some(match (positive, op) {
                        (None, _) => docs,
                        (Some(acc), BooleanOperator::And) => intersect(&acc, &docs),
                        (Some(acc), _) => union(&acc, &docs),
                    });
                    if op == BooleanOperator::And
                        && positive.as_ref().is_some_and(|docs| docs.is_empty())
                    {
                        return Ok(Vec::new());
                    }
                }
            }
        }

        let Some(mut docs) = positive else {
            return Err(misplaced_not());
        };
        for negative in &excluded {
            docs = subtract(&docs, negative);
        }
        Ok(docs)
    }
}

/// Execute `node` on `field` with default settings.
pub fn execute(
    node: &QueryNode,
    field: &str,
    store: &PostingsStore,
    top_n: usize,
) -> Result<Vec<ScoreHit>> {
    Executor::new(store).execute(node, field, top_n)
}

/// Documents in both lists; scores summed.
fn intersect(a: &[(DocId, f32)], b: &[(DocId, f32)]) -> ScoredDocs {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push((a[i].0, a[i].1 + b[j].1));
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Documents in either list; scores of shared documents summed.
fn union(a: &[(DocId, f32)], b: &[(DocId, f32)]) -> ScoredDocs {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push((a[i].0, a[i].1 + b[j].1));
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Sort by document and sum the scores of repeated documents. The sort is
/// stable, so sums are added in input order and stay deterministic.
fn sum_by_doc(mut docs: ScoredDocs) -> ScoredDocs {
    docs.sort_by_key(|&(doc_id, _)| doc_id);
    let mut out: ScoredDocs = Vec::with_capacity(docs.len());
    for (doc_id, score) in docs {
        match out.last_mut() {
            Some(last) if last.0 == doc_id => last.1 += score,
            _ => out.push((doc_id, score)),
        }
    }
    out
}

/// Documents of `a` not in `b`; scores from `a`.
fn subtract(a: &[(DocId, f32)], b: &[(DocId, f32)]) -> ScoredDocs {
    let mut out = Vec::with_capacity(a.len());
    let mut j = 0;
    for &(doc_id, score) in a {
        while j < b.len() && b[j].0 < doc_id {
            j += 1;
        }
        if j < b.len() && b[j].0 == doc_id {
            continue;
        }
        out.push((doc_id, score));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::builder::{Document, IndexBuilder};
    use crate::query::parser::parse;

    fn corpus() -> PostingsStore {
        let mut builder = IndexBuilder::new();
        for text in ["red fox", "red dog", "blue fox"] {
            builder
                .add_document(Document::new().add_tokens("body", text.split_whitespace()))
                .unwrap();
        }
        builder.build().unwrap()
    }

    fn run(store: &PostingsStore, query: &str, top_n: usize) -> Vec<ScoreHit> {
        execute(&parse("body", query).unwrap(), "body", store, top_n).unwrap()
    }

    fn docs(hits: &[ScoreHit]) -> Vec<DocId> {
        hits.iter().map(|h| h.doc_id).collect()
    }

    #[test]
    fn test_merge_helpers() {
        let a = vec![(1, 1.0), (3, 1.0), (5, 1.0)];
        let b = vec![(3, 2.0), (4, 2.0), (5, 2.0)];
        assert_eq!(intersect(&a, &b), vec![(3, 3.0), (5, 3.0)]);
        assert_eq!(
            union(&a, &b),
            vec![(1, 1.0), (3, 3.0), (4, 2.0), (5, 3.0)]
        );
        assert_eq!(subtract(&a, &b), vec![(1, 1.0)]);
        assert_eq!(subtract(&a, &[]), a);
        assert_eq!(
            sum_by_doc(vec![(5, 1.0), (1, 1.0), (5, 2.0), (3, 0.5), (1, 1.0)]),
            vec![(1, 2.0), (3, 0.5), (5, 3.0)]
        );
        assert!(sum_by_doc(Vec::new()).is_empty());
    }

    #[test]
    fn test_wildcard_sums_matching_terms() {
        let mut builder = IndexBuilder::new();
        builder
            .add_document(Document::new().add_tokens("body", ["fox", "fog"]))
            .unwrap();
        builder
            .add_document(Document::new().add_tokens("body", ["fog", "cat"]))
            .unwrap();
        builder
            .add_document(Document::new().add_tokens("body", ["cat", "cow"]))
            .unwrap();
        let store = builder.build().unwrap();

        let hits = run(&store, "fo*", 10);
        assert_eq!(docs(&hits), vec![0, 1]);
        // Two matching terms, each tf 1 in a length 2 document.
        assert!((hits[0].score - 2.0 / 3.0).abs() < 1e-6);
        assert!((hits[1].score - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_term_scores() {
        let store = corpus();
        let hits = run(&store, "fox", 10);
        assert_eq!(docs(&hits), vec![0, 2]);
        // tf 1, length 2
        assert!((hits[0].score - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(hits[0].score, hits[1].score);
    }

    #[test]
    fn test_and_returns_only_shared_document() {
        let store = corpus();
        let hits = run(&store, "red AND fox", 10);
        assert_eq!(docs(&hits), vec![0]);
        assert!((hits[0].score - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_or_sums_scores() {
        let store = corpus();
        let hits = run(&store, "red OR fox", 10);
        assert_eq!(docs(&hits), vec![0, 1, 2]);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_not_excludes() {
        let store = corpus();
        assert_eq!(docs(&run(&store, "red NOT dog", 10)), vec![0]);
        assert_eq!(docs(&run(&store, "fox OR dog NOT blue", 10)), vec![0, 1, 2]);
        assert_eq!(docs(&run(&store, "(fox OR dog) NOT blue", 10)), vec![0, 1]);
    }

    #[test]
    fn test_phrase_requires_adjacency() {
        let store = corpus();
        assert_eq!(docs(&run(&store, "\"red fox\"", 10)), vec![0]);
        assert!(run(&store, "\"fox red\"", 10).is_empty());
        assert!(run(&store, "\"red cat\"", 10).is_empty());
        assert_eq!(docs(&run(&store, "\"fox\"", 10)), vec![0, 2]);
    }

    #[test]
    fn test_phrase_with_repeated_terms() {
        let mut builder = IndexBuilder::new();
        builder
            .add_document(Document::new().add_tokens("body", ["a", "b", "a", "c"]))
            .unwrap();
        builder
            .add_document(Document::new().add_tokens("body", ["a", "c", "a", "b"]))
            .unwrap();
        let store = builder.build().unwrap();

        assert_eq!(docs(&run(&store, "\"a c\"", 10)), vec![0, 1]);
        assert_eq!(docs(&run(&store, "\"b a c\"", 10)), vec![0]);
    }

    #[test]
    fn test_phrase_without_positions_is_error() {
        let mut builder = IndexBuilder::new().store_positions(false);
        builder
            .add_document(Document::new().add_tokens("body", ["red", "fox"]))
            .unwrap();
        let store = builder.build().unwrap();

        let err = execute(&QueryNode::phrase(["red", "fox"]), "body", &store, 10).unwrap_err();
        assert!(matches!(err, QuarryError::InvalidQuery(_)));
    }

    #[test]
    fn test_wildcards() {
        let store = corpus();
        assert_eq!(docs(&run(&store, "fo*", 10)), vec![0, 2]);
        assert_eq!(docs(&run(&store, "*ed", 10)), vec![0, 1]);
        assert_eq!(docs(&run(&store, "d?g", 10)), vec![1]);
        assert_eq!(docs(&run(&store, "*", 10)), vec![0, 1, 2]);
        assert!(run(&store, "zz*", 10).is_empty());
    }

    #[test]
    fn test_wildcard_expansion_cap() {
        let store = corpus();
        let hits = Executor::new(&store)
            .with_max_expansions(1)
            .execute(&QueryNode::wildcard("*"), "body", 10)
            .unwrap();
        // Only "blue", the first term in byte order.
        assert_eq!(docs(&hits), vec![2]);
    }

    #[test]
    fn test_top_n_bounds() {
        let store = corpus();
        assert!(run(&store, "red OR fox", 0).is_empty());
        assert_eq!(run(&store, "red OR fox", 2).len(), 2);
        assert_eq!(run(&store, "fox", 100).len(), 2);
    }

    #[test]
    fn test_missing_field_is_empty() {
        let store = corpus();
        let hits = execute(&QueryNode::term("fox"), "title", &store, 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_root_not_rejected() {
        let store = corpus();
        let err = execute(&QueryNode::not(QueryNode::term("fox")), "body", &store, 10).unwrap_err();
        assert!(err.is_syntax());
    }

    #[test]
    fn test_deterministic() {
        let store = corpus();
        let query = parse("body", "red OR fox OR *o*").unwrap();
        let first = execute(&query, "body", &store, 10).unwrap();
        for _ in 0..5 {
            assert_eq!(execute(&query, "body", &store, 10).unwrap(), first);
        }
    }

    #[test]
    fn test_expired_deadline() {
        let store = corpus();
        let err = Executor::new(&store)
            .with_deadline(Some(Instant::now()))
            .execute(&QueryNode::term("fox"), "body", 10)
            .unwrap_err();
        assert!(matches!(err, QuarryError::Timeout));
    }

    #[test]
    fn test_bm25_ranks_rare_term_higher() {
        let store = corpus();
        let hits = Executor::new(&store)
            .with_similarity(Similarity::bm25())
            .execute(&parse("body", "red OR blue").unwrap(), "body", 10)
            .unwrap();
        // "blue" occurs once, "red" twice.
        assert_eq!(hits[0].doc_id, 2);
    }
}
