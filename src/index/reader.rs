//! Read-only handle over an opened index directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{QuarryError, Result};
use crate::index::format::{self, IndexMeta};
use crate::index::store::{IndexStats, PostingsStore};

/// Owns the loaded postings store of one index directory.
///
/// Searches take a snapshot (`Arc<PostingsStore>`) and never block each
/// other. `close()` drops the handle's reference; snapshots already handed out
/// stay valid until their searches finish.
#[derive(Debug)]
pub struct IndexReader {
    path: PathBuf,
    meta: IndexMeta,
    store: RwLock<Option<Arc<PostingsStore>>>,
}

impl IndexReader {
    /// Open the index at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (meta, store) = format::read_index(path)?;
        log::info!(
            "Opened index at {} ({} documents, {} fields)",
            path.display(),
            meta.doc_count,
            meta.fields.len()
        );
        Ok(IndexReader {
            path: path.to_path_buf(),
            meta,
            store: RwLock::new(Some(Arc::new(store))),
        })
    }

    /// Wrap a store built in memory, e.g. by [`IndexBuilder::build`](crate::IndexBuilder::build).
    pub fn from_store(store: PostingsStore) -> Self {
        let stats = store.stats();
        IndexReader {
            path: PathBuf::new(),
            meta: IndexMeta {
                format_version: format::FORMAT_VERSION,
                doc_count: stats.doc_count,
                segment: String::new(),
                checksum: 0,
                fields: stats.fields,
            },
            store: RwLock::new(Some(Arc::new(store))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    /// The current store, or `ClosedHandle` after `close()`.
    pub fn snapshot(&self) -> Result<Arc<PostingsStore>> {
        self.store.read().clone().ok_or(QuarryError::ClosedHandle)
    }

    pub fn is_closed(&self) -> bool {
        self.store.read().is_none()
    }

    pub fn stats(&self) -> Result<IndexStats> {
        Ok(self.snapshot()?.stats())
    }

    /// Release the store. A second call fails with `ClosedHandle`.
    pub fn close(&self) -> Result<()> {
        match self.store.write().take() {
            Some(store) => {
                let in_flight = Arc::strong_count(&store) - 1;
                if in_flight > 0 {
                    log::warn!(
                        "Closing index at {} with {in_flight} search(es) still holding a snapshot",
                        self.path.display()
                    );
                } else {
                    log::info!("Closed index at {}", self.path.display());
                }
                Ok(())
            }
            None => Err(QuarryError::ClosedHandle),
        }
    }
}
