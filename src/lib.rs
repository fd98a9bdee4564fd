//! # Quarry
//!
//! A small full-text search core: open an on-disk inverted index, run boolean
//! query strings over several fields, and get ranked `(doc_id, score)` hits
//! per field.
//!
//! ## Features
//!
//! - FST term dictionaries and memory-mapped segments
//! - Term, phrase, wildcard and AND/OR/NOT queries
//! - Length-normalised or BM25 scoring
//! - Per-field results and errors; one bad field never fails the others
//!
//! ## Example
//!
//! ```
//! use quarry::{Document, IndexBuilder, Searcher, SearcherConfig};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut builder = IndexBuilder::new();
//! for text in ["red fox", "red dog", "blue fox"] {
//!     builder
//!         .add_document(Document::new().add_tokens("body", text.split_whitespace()))
//!         .unwrap();
//! }
//! builder.write(dir.path()).unwrap();
//!
//! let searcher = Searcher::open(SearcherConfig::new(dir.path())).unwrap();
//! let results = searcher.search(&["body"], "red AND fox");
//! let hits = results.hits("body").unwrap();
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].doc_id, 0);
//! ```
pub mod config;
mod error;
pub mod index;
pub mod query;
pub mod search;
mod util;

pub use config::{SearcherConfig, SearcherConfigBuilder};
pub use error::{QuarryError, Result};
pub use index::{
    DocId, Document, FieldStats, IndexBuilder, IndexReader, IndexStats, PostingsStore,
};
pub use query::{BooleanOperator, QueryNode, QueryParser, ScoreHit, Similarity};
pub use search::{SearchOptions, SearchResults, Searcher};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
