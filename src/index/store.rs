//! The in-memory postings store searched by the executor.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};
use crate::index::dictionary::TermDictionary;
use crate::index::posting::{DocId, PostingList};

/// Inverted index for a single field.
#[derive(Debug, Clone)]
pub struct FieldIndex {
    dictionary: TermDictionary,
    /// Parallel to the dictionary ordinals.
    postings: Vec<PostingList>,
    /// Token count of this field per document, indexed by `DocId`.
    doc_lengths: Vec<u32>,
    total_length: u64,
    has_positions: bool,
}

impl FieldIndex {
    /// Assemble a field index, checking that the parts agree.
    pub fn new(
        dictionary: TermDictionary,
        postings: Vec<PostingList>,
        doc_lengths: Vec<u32>,
        has_positions: bool,
    ) -> Result<Self> {
        if dictionary.len() != postings.len() {
            return Err(QuarryError::other(format!(
                "term dictionary has {} terms but {} postings lists were given",
                dictionary.len(),
                postings.len()
            )));
        }
        let doc_count = doc_lengths.len();
        for list in &postings {
            if let Some(last) = list.as_slice().last()
                && last.doc_id as usize >= doc_count
            {
                return Err(QuarryError::other(format!(
                    "posting references document {} beyond document count {doc_count}",
                    last.doc_id
                )));
            }
        }
        let total_length = doc_lengths.iter().map(|&len| u64::from(len)).sum();
        Ok(FieldIndex {
            dictionary,
            postings,
            doc_lengths,
            total_length,
            has_positions,
        })
    }

    pub fn dictionary(&self) -> &TermDictionary {
        &self.dictionary
    }

    pub fn postings(&self, term: &str) -> Option<&PostingList> {
        self.dictionary
            .get(term)
            .and_then(|ordinal| self.postings.get(ordinal))
    }

    pub fn postings_by_ordinal(&self, ordinal: usize) -> Option<&PostingList> {
        self.postings.get(ordinal)
    }

    pub(crate) fn postings_lists(&self) -> &[PostingList] {
        &self.postings
    }

    /// Field length of `doc_id`; zero for documents without this field.
    pub fn doc_length(&self, doc_id: DocId) -> u32 {
        self.doc_lengths
            .get(doc_id as usize)
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn doc_lengths(&self) -> &[u32] {
        &self.doc_lengths
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    /// Mean field length over all documents in the index.
    pub fn average_length(&self) -> f32 {
        if self.doc_lengths.is_empty() {
            0.0
        } else {
            self.total_length as f32 / self.doc_lengths.len() as f32
        }
    }

    pub fn has_positions(&self) -> bool {
        self.has_positions
    }

    pub fn term_count(&self) -> usize {
        self.dictionary.len()
    }
}

/// Per-field summary reported by [`PostingsStore::stats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub name: String,
    pub term_count: usize,
    pub total_length: u64,
    pub has_positions: bool,
}

/// Summary of an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub doc_count: u32,
    pub fields: Vec<FieldStats>,
}

/// All field indexes of one index snapshot. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct PostingsStore {
    fields: AHashMap<String, FieldIndex>,
    doc_count: u32,
}

impl PostingsStore {
    pub fn new(doc_count: u32) -> Self {
        PostingsStore {
            fields: AHashMap::new(),
            doc_count,
        }
    }

    pub(crate) fn insert_field(&mut self, name: impl Into<String>, field: FieldIndex) -> Result<()> {
        let name = name.into();
        if field.doc_lengths().len() != self.doc_count as usize {
            return Err(QuarryError::other(format!(
                "field '{name}' covers {} documents, index has {}",
                field.doc_lengths().len(),
                self.doc_count
            )));
        }
        if self.fields.insert(name.clone(), field).is_some() {
            return Err(QuarryError::other(format!("duplicate field '{name}'")));
        }
        Ok(())
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    pub fn field(&self, name: &str) -> Option<&FieldIndex> {
        self.fields.get(name)
    }

    /// Field names in sorted order.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn postings(&self, field: &str, term: &str) -> Option<&PostingList> {
        self.field(field).and_then(|f| f.postings(term))
    }

    /// Number of documents whose `field` contains `term`.
    pub fn doc_freq(&self, field: &str, term: &str) -> usize {
        self.postings(field, term).map_or(0, PostingList::doc_freq)
    }

    /// Terms of `field` in byte order; empty for unknown fields.
    pub fn terms(&self, field: &str) -> Vec<String> {
        self.field(field)
            .map(|f| f.dictionary().terms())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> IndexStats {
        let fields = self
            .field_names()
            .into_iter()
            .filter_map(|name| {
                self.field(name).map(|f| FieldStats {
                    name: name.to_string(),
                    term_count: f.term_count(),
                    total_length: f.total_length(),
                    has_positions: f.has_positions(),
                })
            })
            .collect();
        IndexStats {
            doc_count: self.doc_count,
            fields,
        }
    }
}
