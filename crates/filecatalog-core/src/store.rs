//! The catalog persistence abstraction.

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::record::{ContentHash, DirectoryMarker, FileRecord};

/// Fields written by [`CatalogStore::upsert_by_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordFields {
    pub content_hash: ContentHash,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Persisted collection of file records and directory markers.
///
/// The scan engine only ever reaches the catalog through this trait, and the
/// handle is always passed in explicitly. Implementations do no locking
/// across callers: two writers to the same path race and the last write wins.
pub trait CatalogStore {
    /// Look up the record stored for `path`.
    fn find_by_path(&self, path: &str) -> Result<Option<FileRecord>, StoreError>;

    /// Insert a record for `path`, or update hash, size and mtime in place.
    ///
    /// An update keeps the record's `duplicate_names`.
    fn upsert_by_path(&mut self, path: &str, fields: RecordFields) -> Result<(), StoreError>;

    /// Look up a record with the given content hash.
    ///
    /// When several records share the hash, the one with the smallest path
    /// is returned.
    fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<FileRecord>, StoreError>;

    /// Look up the marker stored for a directory.
    fn find_directory_marker(&self, path: &str) -> Result<Option<DirectoryMarker>, StoreError>;

    /// Insert or overwrite the marker for a directory.
    fn upsert_directory_marker(
        &mut self,
        path: &str,
        scanned_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Insert a complete record.
    ///
    /// Fails with [`StoreError::Conflict`] when a record already exists at
    /// the same path; the existing record is left untouched.
    fn insert(&mut self, record: FileRecord) -> Result<(), StoreError>;

    /// Add `name` to the duplicate names of the record found by hash.
    ///
    /// Returns `false` when no record has this hash. Adding a name that is
    /// already present is a no-op.
    fn add_duplicate_name(&mut self, hash: &ContentHash, name: &str) -> Result<bool, StoreError>;

    /// Every file record, ordered by path.
    fn records(&self) -> Result<Vec<FileRecord>, StoreError>;

    /// Remove the record found by hash. Returns whether one was removed.
    fn remove_by_hash(&mut self, hash: &ContentHash) -> Result<bool, StoreError>;

    /// Change the path of the record found by hash.
    ///
    /// Returns whether a record matched. Fails with
    /// [`StoreError::Conflict`] when a different record already holds
    /// `new_path`.
    fn rename_by_hash(&mut self, hash: &ContentHash, new_path: &str) -> Result<bool, StoreError>;
}

impl<S: CatalogStore + ?Sized> CatalogStore for &mut S {
    fn find_by_path(&self, path: &str) -> Result<Option<FileRecord>, StoreError> {
        (**self).find_by_path(path)
    }

    fn upsert_by_path(&mut self, path: &str, fields: RecordFields) -> Result<(), StoreError> {
        (**self).upsert_by_path(path, fields)
    }

    fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<FileRecord>, StoreError> {
        (**self).find_by_hash(hash)
    }

    fn find_directory_marker(&self, path: &str) -> Result<Option<DirectoryMarker>, StoreError> {
        (**self).find_directory_marker(path)
    }

    fn upsert_directory_marker(
        &mut self,
        path: &str,
        scanned_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        (**self).upsert_directory_marker(path, scanned_at)
    }

    fn insert(&mut self, record: FileRecord) -> Result<(), StoreError> {
        (**self).insert(record)
    }

    fn add_duplicate_name(&mut self, hash: &ContentHash, name: &str) -> Result<bool, StoreError> {
        (**self).add_duplicate_name(hash, name)
    }

    fn records(&self) -> Result<Vec<FileRecord>, StoreError> {
        (**self).records()
    }

    fn remove_by_hash(&mut self, hash: &ContentHash) -> Result<bool, StoreError> {
        (**self).remove_by_hash(hash)
    }

    fn rename_by_hash(&mut self, hash: &ContentHash, new_path: &str) -> Result<bool, StoreError> {
        (**self).rename_by_hash(hash, new_path)
    }
}
