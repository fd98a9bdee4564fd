//! Inverted index storage: postings, term dictionaries, the on-disk format and
//! the read-only handle.
//!
//! # Module Structure
//!
//! - `posting`: postings lists
//! - `dictionary`: FST term dictionary
//! - `store`: the immutable per-field postings store
//! - `builder`: offline construction from analyzed tokens
//! - `format`: directory layout and segment encoding
//! - `reader`: open/close lifecycle

pub mod builder;
pub mod dictionary;
pub mod format;
pub mod posting;
pub mod reader;
pub mod store;

pub use builder::{Document, IndexBuilder};
pub use posting::{DocId, Posting, PostingList};
pub use reader::IndexReader;
pub use store::{FieldIndex, FieldStats, IndexStats, PostingsStore};
