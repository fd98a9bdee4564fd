//! Searcher configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};
use crate::query::executor::DEFAULT_MAX_WILDCARD_EXPANSIONS;
use crate::query::similarity::Similarity;

const DEFAULT_TOP_N: usize = 10;

/// Configuration for a [`Searcher`](crate::Searcher).
///
/// Every field except `index_root` has a default, so a minimal JSON config is
/// `{"index_root": "/var/lib/index"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearcherConfig {
    /// Directory of the index to open.
    pub index_root: PathBuf,
    /// Hits returned per field when the caller gives no limit.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default)]
    pub similarity: Similarity,
    /// Cap on the terms one wildcard expands to.
    #[serde(default = "default_max_wildcard_expansions")]
    pub max_wildcard_expansions: usize,
    /// Accept patterns such as `*oo`.
    #[serde(default = "default_true")]
    pub allow_leading_wildcard: bool,
    /// Search the requested fields on the rayon pool.
    #[serde(default)]
    pub parallel_fields: bool,
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_max_wildcard_expansions() -> usize {
    DEFAULT_MAX_WILDCARD_EXPANSIONS
}

fn default_true() -> bool {
    true
}

impl SearcherConfig {
    pub fn new(index_root: impl Into<PathBuf>) -> Self {
        SearcherConfig {
            index_root: index_root.into(),
            top_n: DEFAULT_TOP_N,
            similarity: Similarity::default(),
            max_wildcard_expansions: DEFAULT_MAX_WILDCARD_EXPANSIONS,
            allow_leading_wildcard: true,
            parallel_fields: false,
        }
    }

    pub fn builder(index_root: impl Into<PathBuf>) -> SearcherConfigBuilder {
        SearcherConfigBuilder {
            config: SearcherConfig::new(index_root),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SearcherConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.index_root.as_os_str().is_empty() {
            return Err(QuarryError::invalid_argument("index_root must not be empty"));
        }
        if self.max_wildcard_expansions == 0 {
            return Err(QuarryError::invalid_argument(
                "max_wildcard_expansions must be at least 1",
            ));
        }
        if let Similarity::Bm25 { k1, b } = self.similarity
            && (!k1.is_finite() || k1 <= 0.0 || !(0.0..=1.0).contains(&b))
        {
            return Err(QuarryError::invalid_argument(format!(
                "invalid BM25 parameters k1={k1}, b={b}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SearcherConfigBuilder {
    config: SearcherConfig,
}

impl SearcherConfigBuilder {
    pub fn top_n(mut self, top_n: usize) -> Self {
        self.config.top_n = top_n;
        self
    }

    pub fn similarity(mut self, similarity: Similarity) -> Self {
        self.config.similarity = similarity;
        self
    }

    pub fn max_wildcard_expansions(mut self, max: usize) -> Self {
        self.config.max_wildcard_expansions = max;
        self
    }

    pub fn allow_leading_wildcard(mut self, allow: bool) -> Self {
        self.config.allow_leading_wildcard = allow;
        self
    }

    pub fn parallel_fields(mut self, parallel: bool) -> Self {
        self.config.parallel_fields = parallel;
        self
    }

    pub fn build(self) -> Result<SearcherConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
