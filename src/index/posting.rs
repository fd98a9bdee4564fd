//! Postings lists.

use serde::{Deserialize, Serialize};

/// Dense document identifier assigned at build time.
pub type DocId = u32;

/// One document's entry in a postings list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Document containing the term.
    pub doc_id: DocId,
    /// Number of occurrences of the term in the document's field.
    pub term_freq: u32,
    /// Token offsets of each occurrence, ascending. Empty when the field was
    /// indexed without positions.
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn new(doc_id: DocId, term_freq: u32) -> Self {
        Posting {
            doc_id,
            term_freq,
            positions: Vec::new(),
        }
    }

    pub fn with_positions(doc_id: DocId, positions: Vec<u32>) -> Self {
        Posting {
            doc_id,
            term_freq: positions.len() as u32,
            positions,
        }
    }
}

/// Postings for a single (field, term), strictly ascending by `doc_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingList {
    postings: Vec<Posting>,
}

impl PostingList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from postings that are already sorted by document.
    ///
    /// Returns `None` if the order is not strictly ascending.
    pub fn from_sorted(postings: Vec<Posting>) -> Option<Self> {
        if postings.windows(2).all(|w| w[0].doc_id < w[1].doc_id) {
            Some(PostingList { postings })
        } else {
            None
        }
    }

    /// Append a posting for a document greater than every document already present.
    pub(crate) fn push(&mut self, posting: Posting) {
        debug_assert!(
            self.postings
                .last()
                .is_none_or(|last| last.doc_id < posting.doc_id)
        );
        self.postings.push(posting);
    }

    /// Mutable access to the last posting, used while building.
    pub(crate) fn last_mut(&mut self) -> Option<&mut Posting> {
        self.postings.last_mut()
    }

    /// Number of documents containing the term.
    pub fn doc_freq(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Posting> {
        self.postings.iter()
    }

    pub fn as_slice(&self) -> &[Posting] {
        &self.postings
    }

    /// Binary search for a document's posting.
    pub fn get(&self, doc_id: DocId) -> Option<&Posting> {
        self.postings
            .binary_search_by_key(&doc_id, |p| p.doc_id)
            .ok()
            .map(|idx| &self.postings[idx])
    }
}

impl<'a> IntoIterator for &'a PostingList {
    type Item = &'a Posting;
    type IntoIter = std::slice::Iter<'a, Posting>;

    fn into_iter(self) -> Self::IntoIter {
        self.postings.iter()
    }
}
