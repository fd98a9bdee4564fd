//! Error types for quarry.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// The error type for all quarry operations.
#[derive(Error, Debug)]
pub enum QuarryError {
    /// The index directory is missing, corrupt, or written by an incompatible version.
    #[error("Failed to open index at {path}: {reason}")]
    IndexOpen { path: PathBuf, reason: String },

    /// The index handle was used after `close()`.
    #[error("Index handle is closed")]
    ClosedHandle,

    /// The query string could not be parsed.
    #[error("Query syntax error at offset {offset} near '{fragment}': {message}")]
    QuerySyntax {
        message: String,
        fragment: String,
        offset: usize,
    },

    /// The query is well formed but cannot be executed against this index.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The search ran past its deadline.
    #[error("Search exceeded its deadline")]
    Timeout,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Longest query excerpt carried by a syntax error.
const MAX_FRAGMENT_CHARS: usize = 40;

/// Result type alias for quarry operations.
pub type Result<T> = std::result::Result<T, QuarryError>;

impl QuarryError {
    pub fn index_open(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        QuarryError::IndexOpen {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    /// Create a syntax error pointing at `offset` in `query`.
    ///
    /// The fragment is the remainder of the query from `offset`, cut at the next
    /// whitespace and at `MAX_FRAGMENT_CHARS` characters.
    pub fn syntax(message: impl Into<String>, query: &str, offset: usize) -> Self {
        let offset = offset.min(query.len());
        let rest = query.get(offset..).unwrap_or_default();
        let fragment: String = rest
            .chars()
            .enumerate()
            .take_while(|&(i, c)| i == 0 || !c.is_whitespace())
            .map(|(_, c)| c)
            .take(MAX_FRAGMENT_CHARS)
            .collect();
        QuarryError::QuerySyntax {
            message: message.into(),
            fragment,
            offset,
        }
    }

    pub fn invalid_query(msg: impl Into<String>) -> Self {
        QuarryError::InvalidQuery(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        QuarryError::InvalidArgument(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        QuarryError::Other(msg.into())
    }

    /// Whether this error came from the query string rather than the index.
    pub fn is_syntax(&self) -> bool {
        matches!(self, QuarryError::QuerySyntax { .. })
    }
}
