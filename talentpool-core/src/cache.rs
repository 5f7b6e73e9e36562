//! Memoized export loading
//!
//! Cache key: canonical path of the export. An entry is reused while the
//! file's modification time and length are unchanged; otherwise the file is
//! re-read and the entry replaced.

use crate::error::{DashboardError, Result};
use crate::events::EventTable;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

#[derive(Debug)]
struct CachedTable {
    modified: Option<SystemTime>,
    len: u64,
    table: Arc<EventTable>,
}

/// Loaded exports keyed by path
#[derive(Debug, Default)]
pub struct TableCache {
    entries: HashMap<PathBuf, CachedTable>,
    hits: usize,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an export, reusing the cached table when the file is unchanged
    pub fn load(&mut self, path: &Path) -> Result<Arc<EventTable>> {
        if !path.exists() {
            return Err(DashboardError::MissingFile(path.to_path_buf()));
        }
        let io_err = |source| DashboardError::Io {
            path: path.to_path_buf(),
            source,
        };
        let key = path.canonicalize().map_err(io_err)?;
        let meta = std::fs::metadata(&key).map_err(io_err)?;
        let modified = meta.modified().ok();

        if let Some(entry) = self.entries.get(&key) {
            if entry.modified == modified && entry.len == meta.len() {
                self.hits += 1;
                tracing::debug!(path = %key.display(), "table cache hit");
                return Ok(Arc::clone(&entry.table));
            }
        }

        let table = Arc::new(EventTable::load(&key)?);
        self.entries.insert(
            key,
            CachedTable {
                modified,
                len: meta.len(),
                table: Arc::clone(&table),
            },
        );
        Ok(table)
    }

    /// Drop the entry for a path, if any
    pub fn invalidate(&mut self, path: &Path) {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.entries.remove(&key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loads served from memory
    pub fn hits(&self) -> usize {
        self.hits
    }
}
