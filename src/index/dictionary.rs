//! Per-field term dictionary backed by an FST.
//!
//! The FST maps each term to its ordinal, which indexes the field's postings
//! vector. Terms are stored in byte order, so prefix scans are range scans.

use fst::automaton::{Automaton, Str};
use fst::{IntoStreamer, Map, MapBuilder, Streamer};

use crate::error::{QuarryError, Result};

/// Sorted set of distinct terms for one field.
#[derive(Clone)]
pub struct TermDictionary {
    fst: Map<Vec<u8>>,
}

impl std::fmt::Debug for TermDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermDictionary")
            .field("terms", &self.fst.len())
            .finish()
    }
}

impl TermDictionary {
    /// Build a dictionary from terms in ascending byte order. The ordinal of
    /// each term is its position in the iterator.
    pub fn from_sorted_terms<'a, I>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut builder = MapBuilder::memory();
        for (ordinal, term) in terms.into_iter().enumerate() {
            builder
                .insert(term.as_bytes(), ordinal as u64)
                .map_err(|e| QuarryError::other(format!("term dictionary: {e}")))?;
        }
        let bytes = builder
            .into_inner()
            .map_err(|e| QuarryError::other(format!("term dictionary: {e}")))?;
        Self::from_bytes(bytes)
    }

    /// Load a dictionary from serialized FST bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let fst = Map::new(bytes)
            .map_err(|e| QuarryError::other(format!("invalid term dictionary: {e}")))?;
        Ok(TermDictionary { fst })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.fst.as_fst().as_bytes()
    }

    /// Ordinal of `term`, if present.
    pub fn get(&self, term: &str) -> Option<usize> {
        self.fst.get(term.as_bytes()).map(|ordinal| ordinal as usize)
    }

    pub fn len(&self) -> usize {
        self.fst.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit terms starting with `prefix` in byte order until `visit` returns
    /// `false`. An empty prefix visits every term.
    pub fn scan_prefix<F>(&self, prefix: &str, mut visit: F)
    where
        F: FnMut(&str, usize) -> bool,
    {
        let automaton = Str::new(prefix).starts_with();
        let mut stream = self.fst.search(automaton).into_stream();
        while let Some((key, ordinal)) = stream.next() {
            // Keys come from &str input, so this only skips on corrupt data.
            let Ok(term) = std::str::from_utf8(key) else {
                continue;
            };
            if !visit(term, ordinal as usize) {
                break;
            }
        }
    }

    /// All terms in byte order.
    pub fn terms(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.len());
        self.scan_prefix("", |term, _| {
            out.push(term.to_string());
            true
        });
        out
    }
}
