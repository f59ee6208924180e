//! Local copies of the files being edited, and which of them the remote store
//! is missing.
//!
//! A record is pending when it was edited since its last confirmed write, or
//! when it was created locally and never written. Pending records are pushed
//! by [`FileSyncCache::sync_pending`] before every run.

use tracing::{debug, info};

use crate::error::{LoadError, SyncError};
use crate::services::FileStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: String,
    pub content: String,
    pub is_dirty: bool,
    pub has_been_synced: bool,
}

impl FileRecord {
    fn clean(path: &str, content: String, has_been_synced: bool) -> Self {
        Self {
            path: path.to_owned(),
            content,
            is_dirty: false,
            has_been_synced,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.is_dirty || !self.has_been_synced
    }
}

/// Records in insertion order; at most one per path.
#[derive(Debug, Default)]
pub struct FileSyncCache {
    records: Vec<FileRecord>,
    active: Option<String>,
    entry_file: Option<String>,
}

impl FileSyncCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `path` from the store unless already cached, then makes it active.
    pub async fn open(&mut self, path: &str, store: &dyn FileStore) -> Result<(), LoadError> {
        if self.position(path).is_none() {
            let content = store.read(path).await.map_err(|source| LoadError {
                path: path.to_owned(),
                source,
            })?;
            debug!(path, bytes = content.len(), "file loaded");
            self.records.push(FileRecord::clean(path, content, true));
        }
        self.active = Some(path.to_owned());
        Ok(())
    }

    /// Returns false when `path` is not cached.
    pub fn edit(&mut self, path: &str, content: impl Into<String>) -> bool {
        match self.record_mut(path) {
            Some(record) => {
                record.content = content.into();
                record.is_dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn edit_active(&mut self, content: impl Into<String>) -> bool {
        match self.active.clone() {
            Some(path) => self.edit(&path, content),
            None => false,
        }
    }

    /// Adds a locally created file (never written remotely) and makes it active.
    pub fn create(&mut self, path: &str, initial_content: impl Into<String>) {
        let record = FileRecord::clean(path, initial_content.into(), false);
        match self.position(path) {
            Some(index) => self.records[index] = record,
            None => self.records.push(record),
        }
        self.active = Some(path.to_owned());
    }

    /// Drops the record. The entry file stays, and nothing closes mid-run.
    pub fn close(&mut self, path: &str, run_in_progress: bool) -> bool {
        if run_in_progress || self.entry_file.as_deref() == Some(path) {
            return false;
        }
        let Some(index) = self.position(path) else {
            return false;
        };
        self.records.remove(index);

        if self.active.as_deref() == Some(path) {
            self.active = self.records.first().map(|record| record.path.clone());
        }
        true
    }

    /// Unconditional removal, for files deleted from the store.
    pub(crate) fn forget(&mut self, path: &str) {
        if let Some(index) = self.position(path) {
            self.records.remove(index);
        }
        if self.active.as_deref() == Some(path) {
            self.active = self.records.first().map(|record| record.path.clone());
        }
    }

    /// `(path, content)` of every pending record, in insertion order.
    pub fn list_pending(&self) -> Vec<(String, String)> {
        self.records
            .iter()
            .filter(|record| record.is_pending())
            .map(|record| (record.path.clone(), record.content.clone()))
            .collect()
    }

    pub fn mark_synced(&mut self, path: &str) {
        if let Some(record) = self.record_mut(path) {
            record.is_dirty = false;
            record.has_been_synced = true;
        }
    }

    pub fn reset(&mut self) {
        self.records.clear();
        self.active = None;
        self.entry_file = None;
    }

    pub fn set_entry_file(&mut self, path: impl Into<String>) {
        self.entry_file = Some(path.into());
    }

    pub fn set_active(&mut self, path: &str) -> bool {
        if self.position(path).is_none() {
            return false;
        }
        self.active = Some(path.to_owned());
        true
    }

    pub fn entry_file(&self) -> Option<&str> {
        self.entry_file.as_deref()
    }

    pub fn active_path(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active_content(&self) -> Option<&str> {
        self.active
            .as_deref()
            .and_then(|path| self.get(path))
            .map(|record| record.content.as_str())
    }

    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.records.iter().find(|record| record.path == path)
    }

    pub fn paths(&self) -> Vec<&str> {
        self.records
            .iter()
            .map(|record| record.path.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Pushes every pending record to the store, stopping at the first
    /// failure. Records pushed before the failure stay synced.
    pub async fn sync_pending(&mut self, store: &dyn FileStore) -> Result<usize, SyncError> {
        let pending = self.list_pending();
        let total = pending.len();

        for (path, content) in pending {
            let pushed = match store.ensure_exists(&path).await {
                Ok(()) => store.write(&path, &content).await,
                Err(error) => Err(error),
            };
            if let Err(source) = pushed {
                return Err(SyncError { path, source });
            }
            self.mark_synced(&path);
            debug!(%path, "file synced");
        }

        if total > 0 {
            info!(files = total, "pending files synced");
        }
        Ok(total)
    }

    fn position(&self, path: &str) -> Option<usize> {
        self.records.iter().position(|record| record.path == path)
    }

    fn record_mut(&mut self, path: &str) -> Option<&mut FileRecord> {
        self.records.iter_mut().find(|record| record.path == path)
    }
}
