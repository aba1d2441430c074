use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use filecatalog_core::{DirectoryMarker, StoreError};
use filecatalog_scan::{
    CatalogStore, ContentHash, FileFingerprinter, FileRecord, RecordFields, ScanConfig,
    ScanCoordinator, ScanError,
};
use filecatalog_store::{MemoryCatalog, SqliteCatalog};
use tempfile::TempDir;

fn create_test_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    fs::create_dir(root.join("docs")).unwrap();
    fs::write(root.join("a.txt"), "hello").unwrap();
    fs::write(root.join("docs/b.txt"), "hello").unwrap();
    fs::write(root.join("docs/c.txt"), "world").unwrap();

    temp
}

fn coordinator(root: &Path, skip_directories: bool) -> ScanCoordinator {
    let config = ScanConfig::builder()
        .root(root)
        .skip_unchanged_directories(skip_directories)
        .build()
        .unwrap();
    ScanCoordinator::new(config).unwrap()
}

fn hash_of(catalog: &MemoryCatalog, root: &Path, relative: &str) -> ContentHash {
    let path = root.canonicalize().unwrap().join(relative);
    catalog
        .find_by_path(&path.to_string_lossy())
        .unwrap()
        .unwrap()
        .content_hash
}

/// Move an entry's mtime into the future so it is strictly newer than any
/// marker or record written so far.
fn bump_mtime(path: &Path) {
    File::open(path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
}

#[test]
fn test_first_scan_hashes_everything() {
    let temp = create_test_tree();
    let mut catalog = MemoryCatalog::new();

    let result = coordinator(temp.path(), true).scan(&mut catalog).unwrap();

    assert_eq!(result.estimated_total, 3);
    assert_eq!(result.files_scanned, 3);
    assert_eq!(result.files_unchanged, 0);
    assert_eq!(result.files_bypassed, 0);
    assert!(result.inaccessible_paths.is_empty());
    assert_eq!(catalog.len(), 3);
}

#[test]
fn test_identical_content_shares_hash() {
    let temp = create_test_tree();
    let mut catalog = MemoryCatalog::new();
    coordinator(temp.path(), true).scan(&mut catalog).unwrap();

    let a = hash_of(&catalog, temp.path(), "a.txt");
    let b = hash_of(&catalog, temp.path(), "docs/b.txt");
    let c = hash_of(&catalog, temp.path(), "docs/c.txt");

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a, FileFingerprinter::fingerprint_bytes(b"hello"));
    assert_eq!(a.to_hex().len(), ContentHash::HEX_LEN);
}

#[test]
fn test_rescan_is_deterministic() {
    let temp = create_test_tree();

    let mut first = MemoryCatalog::new();
    let mut second = MemoryCatalog::new();
    coordinator(temp.path(), true).scan(&mut first).unwrap();
    coordinator(temp.path(), true).scan(&mut second).unwrap();

    let hashes = |c: &MemoryCatalog| -> Vec<(String, ContentHash)> {
        c.records()
            .unwrap()
            .into_iter()
            .map(|r| (r.path, r.content_hash))
            .collect()
    };
    assert_eq!(hashes(&first), hashes(&second));
}

#[test]
fn test_second_scan_skips_unchanged_files() {
    let temp = create_test_tree();
    let mut catalog = MemoryCatalog::new();
    let coordinator = coordinator(temp.path(), false);

    coordinator.scan(&mut catalog).unwrap();
    let result = coordinator.scan(&mut catalog).unwrap();

    assert_eq!(result.files_scanned, 0);
    assert_eq!(result.files_unchanged, 3);
    assert_eq!(result.directories_unchanged, 0);
}

#[test]
fn test_second_scan_skips_unchanged_directories() {
    let temp = create_test_tree();
    let mut catalog = MemoryCatalog::new();
    let coordinator = coordinator(temp.path(), true);

    coordinator.scan(&mut catalog).unwrap();
    let result = coordinator.scan(&mut catalog).unwrap();

    assert_eq!(result.files_scanned, 0);
    assert!(result.directories_unchanged >= 1);
    assert_eq!(result.estimated_total, 3);
}

#[test]
fn test_modified_file_is_rehashed() {
    let temp = create_test_tree();
    let mut catalog = MemoryCatalog::new();
    let coordinator = coordinator(temp.path(), false);
    coordinator.scan(&mut catalog).unwrap();

    let target = temp.path().join("docs/c.txt");
    fs::write(&target, "changed").unwrap();
    bump_mtime(&target);

    let result = coordinator.scan(&mut catalog).unwrap();
    assert_eq!(result.files_scanned, 1);
    assert_eq!(result.files_unchanged, 2);
    assert_eq!(
        hash_of(&catalog, temp.path(), "docs/c.txt"),
        FileFingerprinter::fingerprint_bytes(b"changed")
    );
}

#[test]
fn test_in_place_edit_hidden_by_directory_skip() {
    let temp = create_test_tree();
    let mut catalog = MemoryCatalog::new();
    let coordinator = coordinator(temp.path(), true);
    coordinator.scan(&mut catalog).unwrap();

    // Rewriting a file does not touch its directory's mtime.
    let target = temp.path().join("a.txt");
    fs::write(&target, "edited").unwrap();
    bump_mtime(&target);

    let result = coordinator.scan(&mut catalog).unwrap();
    assert_eq!(result.files_scanned, 0);
    assert_eq!(
        hash_of(&catalog, temp.path(), "a.txt"),
        FileFingerprinter::fingerprint_bytes(b"hello")
    );
}

#[cfg(unix)]
#[test]
fn test_new_entry_reopens_directory() {
    let temp = create_test_tree();
    let mut catalog = MemoryCatalog::new();
    let coordinator = coordinator(temp.path(), true);
    coordinator.scan(&mut catalog).unwrap();

    fs::write(temp.path().join("d.txt"), "new").unwrap();
    bump_mtime(temp.path());

    let result = coordinator.scan(&mut catalog).unwrap();
    assert_eq!(result.files_scanned, 1);
    assert_eq!(result.files_unchanged, 1);
    // The untouched subdirectory is still skipped as a whole.
    assert_eq!(result.directories_unchanged, 1);
    assert_eq!(catalog.len(), 4);
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_is_bypassed() {
    use std::os::unix::fs::PermissionsExt;

    let temp = create_test_tree();
    let locked = temp.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::write(locked.join("secret.txt"), "secret").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    if fs::read_dir(&locked).is_ok() {
        // Running with elevated privileges; permissions are not enforced.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let mut catalog = MemoryCatalog::new();
    let result = coordinator(temp.path(), true).scan(&mut catalog);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    let result = result.unwrap();
    assert_eq!(result.files_scanned, 3);
    assert_eq!(result.files_bypassed, 1);
    assert_eq!(result.inaccessible_paths.len(), 1);
    assert!(result.inaccessible_paths[0].ends_with("locked"));

    // No marker, so the directory is retried next time.
    let locked_key = temp.path().canonicalize().unwrap().join("locked");
    assert!(catalog
        .find_directory_marker(&locked_key.to_string_lossy())
        .unwrap()
        .is_none());
}

#[cfg(unix)]
#[test]
fn test_self_referencing_symlink_is_bypassed() {
    let temp = create_test_tree();
    std::os::unix::fs::symlink("selfloop", temp.path().join("selfloop")).unwrap();

    let mut catalog = MemoryCatalog::new();
    let result = coordinator(temp.path(), true).scan(&mut catalog).unwrap();

    assert_eq!(result.files_scanned, 3);
    assert_eq!(result.files_bypassed, 1);
    assert_eq!(result.inaccessible_paths.len(), 1);
    assert!(result.inaccessible_paths[0].ends_with("selfloop"));
    assert_eq!(catalog.len(), 3);

    // The rest of the tree is still marked and cataloged.
    let root_key = temp.path().canonicalize().unwrap();
    assert!(catalog
        .find_directory_marker(&root_key.join("docs").to_string_lossy())
        .unwrap()
        .is_some());
}

#[test]
fn test_files_over_limit_are_bypassed() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("small.txt"), "hello").unwrap();
    fs::write(temp.path().join("large.txt"), "hello world").unwrap();

    let config = ScanConfig::builder()
        .root(temp.path())
        .max_hash_size(Some(5u64))
        .build()
        .unwrap();
    let mut catalog = MemoryCatalog::new();
    let result = ScanCoordinator::new(config).unwrap().scan(&mut catalog).unwrap();

    assert_eq!(result.files_scanned, 1);
    assert_eq!(result.files_bypassed, 1);
    assert!(result.inaccessible_paths[0].ends_with("large.txt"));
    assert_eq!(catalog.len(), 1);
}

#[test]
fn test_ignore_patterns_exclude_entries() {
    let temp = create_test_tree();
    fs::write(temp.path().join("cache.tmp"), "scratch").unwrap();

    let config = ScanConfig::builder()
        .root(temp.path())
        .ignore_patterns(vec!["*.tmp".to_string(), "docs".to_string()])
        .build()
        .unwrap();
    let mut catalog = MemoryCatalog::new();
    let result = ScanCoordinator::new(config).unwrap().scan(&mut catalog).unwrap();

    assert_eq!(result.estimated_total, 1);
    assert_eq!(result.files_scanned, 1);
}

#[test]
fn test_missing_root_completes_with_bypass() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MemoryCatalog::new();

    let result = coordinator(&temp.path().join("missing"), true)
        .scan(&mut catalog)
        .unwrap();

    assert_eq!(result.files_scanned, 0);
    assert_eq!(result.files_bypassed, 1);
    assert!(catalog.is_empty());
}

#[test]
fn test_sqlite_catalog_across_runs() {
    let temp = create_test_tree();
    let db = TempDir::new().unwrap();
    let db_path = db.path().join("catalog.db");

    {
        let mut catalog = SqliteCatalog::open(&db_path).unwrap();
        let result = coordinator(temp.path(), false).scan(&mut catalog).unwrap();
        assert_eq!(result.files_scanned, 3);
    }

    let mut catalog = SqliteCatalog::open(&db_path).unwrap();
    let result = coordinator(temp.path(), false).scan(&mut catalog).unwrap();
    assert_eq!(result.files_scanned, 0);
    assert_eq!(result.files_unchanged, 3);
}

/// Catalog that accepts reads but refuses every write.
struct ReadOnlyCatalog;

impl CatalogStore for ReadOnlyCatalog {
    fn find_by_path(&self, _path: &str) -> Result<Option<FileRecord>, StoreError> {
        Ok(None)
    }

    fn upsert_by_path(&mut self, path: &str, _fields: RecordFields) -> Result<(), StoreError> {
        Err(StoreError::corrupt(path, "read-only"))
    }

    fn find_by_hash(&self, _hash: &ContentHash) -> Result<Option<FileRecord>, StoreError> {
        Ok(None)
    }

    fn find_directory_marker(&self, _path: &str) -> Result<Option<DirectoryMarker>, StoreError> {
        Ok(None)
    }

    fn upsert_directory_marker(
        &mut self,
        path: &str,
        _scanned_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Err(StoreError::corrupt(path, "read-only"))
    }

    fn insert(&mut self, record: FileRecord) -> Result<(), StoreError> {
        Err(StoreError::corrupt(record.path, "read-only"))
    }

    fn add_duplicate_name(&mut self, _hash: &ContentHash, _name: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    fn records(&self) -> Result<Vec<FileRecord>, StoreError> {
        Ok(Vec::new())
    }

    fn remove_by_hash(&mut self, _hash: &ContentHash) -> Result<bool, StoreError> {
        Ok(false)
    }

    fn rename_by_hash(&mut self, _hash: &ContentHash, _new_path: &str) -> Result<bool, StoreError> {
        Ok(false)
    }
}

#[test]
fn test_store_failure_aborts_scan() {
    let temp = create_test_tree();
    let err = coordinator(temp.path(), true)
        .scan(&mut ReadOnlyCatalog)
        .unwrap_err();
    assert!(matches!(err, ScanError::Store(_)));
}
