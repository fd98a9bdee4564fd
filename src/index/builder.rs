//! Offline index construction from pre-analyzed tokens.
//!
//! Tokenization and normalization happen before documents reach the builder;
//! every token given here is indexed verbatim.

use std::collections::BTreeMap;
use std::path::Path;

use ahash::AHashMap;

use crate::error::{QuarryError, Result};
use crate::index::dictionary::TermDictionary;
use crate::index::format;
use crate::index::posting::{DocId, Posting, PostingList};
use crate::index::store::{FieldIndex, PostingsStore};

/// A document as a list of fields, each holding its analyzed tokens.
#[derive(Debug, Clone, Default)]
pub struct Document {
    fields: Vec<(String, Vec<String>)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add tokens to a field. Adding the same field again continues its
    /// token positions.
    pub fn add_tokens<F, I, T>(mut self, field: F, tokens: I) -> Self
    where
        F: Into<String>,
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.fields
            .push((field.into(), tokens.into_iter().map(Into::into).collect()));
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields.iter().map(|(f, t)| (f.as_str(), t.as_slice()))
    }
}

#[derive(Debug, Default)]
struct FieldBuilder {
    terms: BTreeMap<String, PostingList>,
    doc_lengths: Vec<u32>,
}

impl FieldBuilder {
    fn add_token(&mut self, doc_id: DocId, token: &str, position: u32, store_positions: bool) {
        let list = self.terms.entry(token.to_string()).or_default();
        match list.last_mut() {
            Some(last) if last.doc_id == doc_id => {
                last.term_freq += 1;
                if store_positions {
                    last.positions.push(position);
                }
            }
            _ => {
                let mut posting = Posting::new(doc_id, 1);
                if store_positions {
                    posting.positions.push(position);
                }
                list.push(posting);
            }
        }
    }

    fn finish(mut self, doc_count: u32, has_positions: bool) -> Result<FieldIndex> {
        self.doc_lengths.resize(doc_count as usize, 0);
        let dictionary = TermDictionary::from_sorted_terms(self.terms.keys().map(String::as_str))?;
        let postings = self.terms.into_values().collect();
        FieldIndex::new(dictionary, postings, self.doc_lengths, has_positions)
    }
}

/// Accumulates documents and produces a [`PostingsStore`] or an index directory.
///
/// # Example
///
/// ```rust,no_run
/// use quarry::{Document, IndexBuilder};
///
/// let mut builder = IndexBuilder::new();
/// builder.add_document(Document::new().add_tokens("body", ["red", "fox"])).unwrap();
/// builder.add_document(Document::new().add_tokens("body", ["red", "dog"])).unwrap();
/// builder.write("/tmp/quarry-index").unwrap();
/// ```
#[derive(Debug)]
pub struct IndexBuilder {
    fields: AHashMap<String, FieldBuilder>,
    next_doc_id: DocId,
    store_positions: bool,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexBuilder {
    pub fn new() -> Self {
        IndexBuilder {
            fields: AHashMap::new(),
            next_doc_id: 0,
            store_positions: true,
        }
    }

    /// Whether to record token positions. Phrase queries need them.
    pub fn store_positions(mut self, store: bool) -> Self {
        self.store_positions = store;
        self
    }

    /// Number of documents added so far.
    pub fn doc_count(&self) -> u32 {
        self.next_doc_id
    }

    /// Add a document and return its assigned id.
    pub fn add_document(&mut self, doc: Document) -> Result<DocId> {
        let doc_id = self.next_doc_id;
        self.next_doc_id = doc_id
            .checked_add(1)
            .ok_or_else(|| QuarryError::invalid_argument("document id space exhausted"))?;

        for (field, tokens) in doc.fields() {
            let builder = self.fields.entry(field.to_string()).or_default();
            if builder.doc_lengths.len() <= doc_id as usize {
                builder.doc_lengths.resize(doc_id as usize + 1, 0);
            }
            let start = builder.doc_lengths[doc_id as usize];
            let added = u32::try_from(tokens.len()).map_err(|_| {
                QuarryError::invalid_argument(format!("too many tokens in field '{field}'"))
            })?;
            let end = start.checked_add(added).ok_or_else(|| {
                QuarryError::invalid_argument(format!("too many tokens in field '{field}'"))
            })?;
            for (offset, token) in tokens.iter().enumerate() {
                builder.add_token(doc_id, token, start + offset as u32, self.store_positions);
            }
            builder.doc_lengths[doc_id as usize] = end;
        }

        Ok(doc_id)
    }

    /// Freeze the accumulated documents into a searchable store.
    pub fn build(self) -> Result<PostingsStore> {
        let doc_count = self.next_doc_id;
        let mut store = PostingsStore::new(doc_count);
        for (name, builder) in self.fields {
            let field = builder.finish(doc_count, self.store_positions)?;
            store.insert_field(name, field)?;
        }
        Ok(store)
    }

    /// Build and write the index directory at `root`, creating it if needed.
    pub fn write(self, root: impl AsRef<Path>) -> Result<PostingsStore> {
        let store = self.build()?;
        format::write_index(&store, root.as_ref())?;
        Ok(store)
    }
}
