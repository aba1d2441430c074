//! In-process catalog.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use filecatalog_core::{
    CatalogStore, ContentHash, DirectoryMarker, FileRecord, RecordFields, StoreError,
};

/// Catalog held entirely in memory.
///
/// Nothing survives the process, which makes it the backing store for
/// stateless scans: every file is hashed on every run.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    records: BTreeMap<String, FileRecord>,
    markers: HashMap<String, DateTime<Utc>>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of file records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if no file records are stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of directory markers.
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    fn path_for_hash(&self, hash: &ContentHash) -> Option<String> {
        self.records
            .values()
            .find(|r| &r.content_hash == hash)
            .map(|r| r.path.clone())
    }
}

impl CatalogStore for MemoryCatalog {
    fn find_by_path(&self, path: &str) -> Result<Option<FileRecord>, StoreError> {
        Ok(self.records.get(path).cloned())
    }

    fn upsert_by_path(&mut self, path: &str, fields: RecordFields) -> Result<(), StoreError> {
        match self.records.get_mut(path) {
            Some(record) => {
                record.content_hash = fields.content_hash;
                record.size = fields.size;
                record.last_modified = fields.last_modified;
            }
            None => {
                self.records.insert(
                    path.to_string(),
                    FileRecord::new(path, fields.content_hash, fields.size, fields.last_modified),
                );
            }
        }
        Ok(())
    }

    fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<FileRecord>, StoreError> {
        Ok(self.records.values().find(|r| &r.content_hash == hash).cloned())
    }

    fn find_directory_marker(&self, path: &str) -> Result<Option<DirectoryMarker>, StoreError> {
        Ok(self
            .markers
            .get(path)
            .map(|at| DirectoryMarker::new(path, *at)))
    }

    fn upsert_directory_marker(
        &mut self,
        path: &str,
        scanned_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.markers.insert(path.to_string(), scanned_at);
        Ok(())
    }

    fn insert(&mut self, record: FileRecord) -> Result<(), StoreError> {
        match self.records.entry(record.path.clone()) {
            Entry::Occupied(entry) => Err(StoreError::conflict(entry.key().as_str())),
            Entry::Vacant(entry) => {
                entry.insert(record);
                Ok(())
            }
        }
    }

    fn add_duplicate_name(&mut self, hash: &ContentHash, name: &str) -> Result<bool, StoreError> {
        let Some(path) = self.path_for_hash(hash) else {
            return Ok(false);
        };
        if let Some(record) = self.records.get_mut(&path) {
            record.duplicate_names.insert(name.to_string());
        }
        Ok(true)
    }

    fn records(&self) -> Result<Vec<FileRecord>, StoreError> {
        Ok(self.records.values().cloned().collect())
    }

    fn remove_by_hash(&mut self, hash: &ContentHash) -> Result<bool, StoreError> {
        Ok(match self.path_for_hash(hash) {
            Some(path) => self.records.remove(&path).is_some(),
            None => false,
        })
    }

    fn rename_by_hash(&mut self, hash: &ContentHash, new_path: &str) -> Result<bool, StoreError> {
        let Some(old_path) = self.path_for_hash(hash) else {
            return Ok(false);
        };
        if old_path != new_path && self.records.contains_key(new_path) {
            return Err(StoreError::conflict(new_path));
        }
        if let Some(mut record) = self.records.remove(&old_path) {
            record.path = new_path.to_string();
            self.records.insert(record.path.clone(), record);
        }
        Ok(true)
    }
}
