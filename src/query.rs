//! Query parsing and execution.
//!
//! - `node`: the query tree and its string form
//! - `parser`: query string to tree
//! - `executor`: tree to ranked hits
//! - `similarity`: per-term scoring
//! - `wildcard`: pattern expansion over the term dictionary
//! - `collector`: top-N selection

pub mod collector;
pub mod executor;
pub mod node;
pub mod parser;
pub mod similarity;
pub mod wildcard;

pub use collector::{ScoreHit, TopHitsCollector};
pub use executor::{DEFAULT_MAX_WILDCARD_EXPANSIONS, Executor, execute};
pub use node::{BooleanOperator, QueryNode};
pub use parser::{QueryParser, parse};
pub use similarity::{Similarity, TermScorer};
pub use wildcard::WildcardPattern;
