//! Top-N hit collection.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::index::posting::DocId;

/// A scored document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreHit {
    pub doc_id: DocId,
    pub score: f32,
}

impl ScoreHit {
    pub fn new(doc_id: DocId, score: f32) -> Self {
        ScoreHit { doc_id, score }
    }

    /// Ranking order: higher score first, then lower doc id.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

/// Heap entry ordered so that the better-ranked hit is greater.
#[derive(Debug, Clone, Copy)]
struct Ranked(ScoreHit);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.rank_cmp(&self.0)
    }
}

/// Keeps the `limit` best hits seen so far.
#[derive(Debug)]
pub struct TopHitsCollector {
    limit: usize,
    /// Min-heap on rank: the root is the worst hit kept.
    heap: BinaryHeap<Reverse<Ranked>>,
    total_hits: usize,
}

impl TopHitsCollector {
    pub fn new(limit: usize) -> Self {
        TopHitsCollector {
            limit,
            heap: BinaryHeap::with_capacity(limit.min(1024)),
            total_hits: 0,
        }
    }

    pub fn collect(&mut self, hit: ScoreHit) {
        self.total_hits += 1;
        if self.limit == 0 {
            return;
        }
        let candidate = Ranked(hit);
        if self.heap.len() < self.limit {
            self.heap.push(Reverse(candidate));
        } else if let Some(mut worst) = self.heap.peek_mut()
            && candidate > worst.0
        {
            *worst = Reverse(candidate);
        }
    }

    /// Number of hits offered, including those not kept.
    pub fn total_hits(&self) -> usize {
        self.total_hits
    }

    /// Kept hits, best first.
    pub fn into_hits(self) -> Vec<ScoreHit> {
        let mut hits: Vec<ScoreHit> = self.heap.into_iter().map(|Reverse(r)| r.0).collect();
        hits.sort_by(ScoreHit::rank_cmp);
        hits
    }
}
