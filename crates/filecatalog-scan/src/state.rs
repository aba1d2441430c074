//! Incremental skip decisions on top of a catalog.

use chrono::{DateTime, Utc};

use filecatalog_core::{CatalogStore, RecordFields, StoreError};

/// Decides what a scan may skip, based on what the catalog already knows.
///
/// Comparisons are plain `stored >= on_disk` on modification times. A file
/// rewritten within the filesystem's timestamp resolution, or with its mtime
/// moved backwards, is not noticed.
#[derive(Debug)]
pub struct ScanStateStore<S> {
    store: S,
}

impl<S: CatalogStore> ScanStateStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Whether the file at `path` must be (re)hashed.
    pub fn needs_hash(&self, path: &str, modified: DateTime<Utc>) -> Result<bool, StoreError> {
        let current = self
            .store
            .find_by_path(path)?
            .is_some_and(|record| record.is_current(modified));
        Ok(!current)
    }

    /// Store a fresh hash, keeping any duplicate names already recorded.
    pub fn record_hash(&mut self, path: &str, fields: RecordFields) -> Result<(), StoreError> {
        self.store.upsert_by_path(path, fields)
    }

    /// Whether the directory has not changed since it was last listed.
    pub fn directory_unchanged(
        &self,
        path: &str,
        modified: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .store
            .find_directory_marker(path)?
            .is_some_and(|marker| marker.is_current(modified)))
    }

    /// Remember that `path` was fully listed at `scanned_at`.
    pub fn mark_directory(
        &mut self,
        path: &str,
        scanned_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.store.upsert_directory_marker(path, scanned_at)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use filecatalog_core::ContentHash;
    use filecatalog_store::MemoryCatalog;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn fields(secs: i64) -> RecordFields {
        RecordFields {
            content_hash: ContentHash::new([1; 32]),
            size: 3,
            last_modified: at(secs),
        }
    }

    #[test]
    fn test_unknown_file_needs_hash() {
        let state = ScanStateStore::new(MemoryCatalog::new());
        assert!(state.needs_hash("/a", at(100)).unwrap());
    }

    #[test]
    fn test_equal_or_older_mtime_is_current() {
        let mut state = ScanStateStore::new(MemoryCatalog::new());
        state.record_hash("/a", fields(100)).unwrap();

        assert!(!state.needs_hash("/a", at(100)).unwrap());
        assert!(!state.needs_hash("/a", at(99)).unwrap());
        assert!(state.needs_hash("/a", at(100) + Duration::nanoseconds(1)).unwrap());
    }

    #[test]
    fn test_directory_marker_decisions() {
        let mut state = ScanStateStore::new(MemoryCatalog::new());
        assert!(!state.directory_unchanged("/d", at(50)).unwrap());

        state.mark_directory("/d", at(100)).unwrap();
        assert!(state.directory_unchanged("/d", at(100)).unwrap());
        assert!(!state.directory_unchanged("/d", at(101)).unwrap());
    }

    #[test]
    fn test_wraps_mutable_reference() {
        let mut catalog = MemoryCatalog::new();
        {
            let mut state = ScanStateStore::new(&mut catalog);
            state.record_hash("/a", fields(1)).unwrap();
            assert_eq!(state.store().len(), 1);
        }
        assert_eq!(catalog.len(), 1);
    }
}
