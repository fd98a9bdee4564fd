//! Multi-field search facade.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::config::SearcherConfig;
use crate::error::{QuarryError, Result};
use crate::index::reader::IndexReader;
use crate::index::store::PostingsStore;
use crate::query::collector::ScoreHit;
use crate::query::executor::Executor;
use crate::query::parser::QueryParser;

/// Per-request overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Hits per field; the config's `top_n` when `None`.
    pub top_n: Option<usize>,
    /// Fields still running after this long fail with `Timeout`.
    pub timeout: Option<Duration>,
}

impl SearchOptions {
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = Some(top_n);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Outcome of one search: a hit list or an error per requested field, in
/// request order.
#[derive(Debug, Default)]
pub struct SearchResults {
    fields: Vec<(String, Result<Vec<ScoreHit>>)>,
}

impl SearchResults {
    pub fn get(&self, field: &str) -> Option<&Result<Vec<ScoreHit>>> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, result)| result)
    }

    /// Hits for `field`, or `None` if it was not requested or failed.
    pub fn hits(&self, field: &str) -> Option<&[ScoreHit]> {
        match self.get(field)? {
            Ok(hits) => Some(hits),
            Err(_) => None,
        }
    }

    pub fn error(&self, field: &str) -> Option<&QuarryError> {
        self.get(field)?.as_ref().err()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Result<Vec<ScoreHit>>)> {
        self.fields.iter().map(|(name, result)| (name.as_str(), result))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    /// True when no field failed.
    pub fn is_ok(&self) -> bool {
        self.fields.iter().all(|(_, result)| result.is_ok())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl IntoIterator for SearchResults {
    type Item = (String, Result<Vec<ScoreHit>>);
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Runs query strings against an opened index.
///
/// # Example
///
/// ```
/// use quarry::{Document, IndexBuilder, IndexReader, Searcher, SearcherConfig};
///
/// let mut builder = IndexBuilder::new();
/// builder.add_document(Document::new().add_tokens("body", ["red", "fox"])).unwrap();
/// builder.add_document(Document::new().add_tokens("body", ["red", "dog"])).unwrap();
/// let reader = IndexReader::from_store(builder.build().unwrap());
///
/// let searcher = Searcher::with_reader(reader, SearcherConfig::new("memory"));
/// let results = searcher.search(&["body"], "red AND fox");
/// assert_eq!(results.hits("body").unwrap()[0].doc_id, 0);
/// ```
#[derive(Debug)]
pub struct Searcher {
    reader: IndexReader,
    parser: QueryParser,
    config: SearcherConfig,
}

impl Searcher {
    /// Validate `config` and open the index at `config.index_root`.
    pub fn open(config: SearcherConfig) -> Result<Self> {
        config.validate()?;
        let reader = IndexReader::open(&config.index_root)?;
        Ok(Self::with_reader(reader, config))
    }

    pub fn with_reader(reader: IndexReader, config: SearcherConfig) -> Self {
        let parser =
            QueryParser::new().with_allow_leading_wildcard(config.allow_leading_wildcard);
        Searcher {
            reader,
            parser,
            config,
        }
    }

    pub fn reader(&self) -> &IndexReader {
        &self.reader
    }

    pub fn config(&self) -> &SearcherConfig {
        &self.config
    }

    /// Search every field in `fields` for `query`, returning the config's
    /// `top_n` hits per field.
    pub fn search<S: AsRef<str>>(&self, fields: &[S], query: &str) -> SearchResults {
        self.search_with_options(fields, query, &SearchOptions::default())
    }

    pub fn search_with_limit<S: AsRef<str>>(
        &self,
        fields: &[S],
        query: &str,
        top_n: usize,
    ) -> SearchResults {
        self.search_with_options(fields, query, &SearchOptions::default().with_top_n(top_n))
    }

    /// Search with per-request options. Fields are handled independently: an
    /// error on one is recorded in its slot and the others still run.
    pub fn search_with_options<S: AsRef<str>>(
        &self,
        fields: &[S],
        query: &str,
        options: &SearchOptions,
    ) -> SearchResults {
        let mut seen = HashSet::new();
        let fields: Vec<&str> = fields
            .iter()
            .map(AsRef::as_ref)
            .filter(|field| seen.insert(*field))
            .collect();

        let store = match self.reader.snapshot() {
            Ok(store) => store,
            Err(_) => {
                log::warn!("Search on closed index at {}", self.reader.path().display());
                return SearchResults {
                    fields: fields
                        .into_iter()
                        .map(|field| (field.to_string(), Err(QuarryError::ClosedHandle)))
                        .collect(),
                };
            }
        };

        let top_n = options.top_n.unwrap_or(self.config.top_n);
        // A timeout too large to represent means no deadline.
        let deadline = options
            .timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let run = |field: &str| {
            let result = self.search_field(&store, field, query, top_n, deadline);
            if let Err(e) = &result {
                log::warn!("Search of field '{field}' for '{query}' failed: {e}");
            }
            (field.to_string(), result)
        };

        let fields: Vec<(String, Result<Vec<ScoreHit>>)> = if self.config.parallel_fields {
            fields.into_par_iter().map(run).collect()
        } else {
            fields.into_iter().map(run).collect()
        };
        SearchResults { fields }
    }

    fn search_field(
        &self,
        store: &PostingsStore,
        field: &str,
        query: &str,
        top_n: usize,
        deadline: Option<Instant>,
    ) -> Result<Vec<ScoreHit>> {
        let node = self.parser.parse(field, query)?;
        Executor::new(store)
            .with_similarity(self.config.similarity)
            .with_max_expansions(self.config.max_wildcard_expansions)
            .with_deadline(deadline)
            .execute(&node, field, top_n)
    }

    /// Close the underlying index. Later searches report `ClosedHandle`.
    pub fn close(&self) -> Result<()> {
        self.reader.close()
    }
}
