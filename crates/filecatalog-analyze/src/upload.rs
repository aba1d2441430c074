//! Upload-time deduplication.

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use filecatalog_core::{CatalogStore, ContentHash, FileRecord, StoreError};
use filecatalog_scan::FileFingerprinter;

/// What happened to an uploaded blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub hash: ContentHash,
    pub is_duplicate: bool,
}

/// Register an uploaded blob under `name`.
///
/// If the catalog already holds content with the same hash, `name` joins
/// that record's duplicate names (adding an existing name is a no-op).
/// Otherwise a record keyed by `name` is inserted. New content arriving
/// under a name that already keys a record fails with
/// [`StoreError::Conflict`] and leaves the catalog unchanged.
pub fn register_upload<S: CatalogStore + ?Sized>(
    store: &mut S,
    bytes: &[u8],
    name: &str,
    modified: DateTime<Utc>,
) -> Result<UploadOutcome, StoreError> {
    let hash = FileFingerprinter::fingerprint_bytes(bytes);

    if store.add_duplicate_name(&hash, name)? {
        debug!(name, %hash, "Upload matches existing content");
        return Ok(UploadOutcome {
            hash,
            is_duplicate: true,
        });
    }

    if store.find_by_path(name)?.is_some() {
        warn!(name, %hash, "Upload name already holds different content");
        return Err(StoreError::conflict(name));
    }

    let mut record = FileRecord::new(name, hash, bytes.len() as u64, modified);
    record.duplicate_names = IndexSet::from([name.to_string()]);
    store.insert(record)?;
    debug!(name, %hash, "Upload stored as new content");

    Ok(UploadOutcome {
        hash,
        is_duplicate: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use filecatalog_store::MemoryCatalog;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_first_upload_is_new() {
        let mut catalog = MemoryCatalog::new();
        let outcome = register_upload(&mut catalog, b"payload", "a.bin", now()).unwrap();

        assert!(!outcome.is_duplicate);
        let record = catalog.find_by_path("a.bin").unwrap().unwrap();
        assert_eq!(record.size, 7);
        assert_eq!(record.content_hash, outcome.hash);
        assert!(record.duplicate_names.contains("a.bin"));
    }

    #[test]
    fn test_same_bytes_two_names() {
        let mut catalog = MemoryCatalog::new();
        let first = register_upload(&mut catalog, b"payload", "a.bin", now()).unwrap();
        let second = register_upload(&mut catalog, b"payload", "b.bin", now()).unwrap();

        assert!(second.is_duplicate);
        assert_eq!(first.hash, second.hash);
        assert_eq!(catalog.len(), 1);

        let record = catalog.find_by_hash(&first.hash).unwrap().unwrap();
        let names: Vec<&str> = record.duplicate_names.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["a.bin", "b.bin"]);
    }

    #[test]
    fn test_repeated_name_is_idempotent() {
        let mut catalog = MemoryCatalog::new();
        register_upload(&mut catalog, b"payload", "a.bin", now()).unwrap();
        let again = register_upload(&mut catalog, b"payload", "a.bin", now()).unwrap();

        assert!(again.is_duplicate);
        let record = catalog.find_by_hash(&again.hash).unwrap().unwrap();
        assert_eq!(record.duplicate_names.len(), 1);
    }

    #[test]
    fn test_upload_matches_scanned_file() {
        let mut catalog = MemoryCatalog::new();
        let hash = FileFingerprinter::fingerprint_bytes(b"hello");
        catalog
            .insert(FileRecord::new("/srv/a.txt", hash, 5, now()))
            .unwrap();

        let outcome = register_upload(&mut catalog, b"hello", "upload.txt", now()).unwrap();
        assert!(outcome.is_duplicate);

        let record = catalog.find_by_path("/srv/a.txt").unwrap().unwrap();
        assert!(record.duplicate_names.contains("upload.txt"));
    }

    #[test]
    fn test_new_content_under_taken_name_is_rejected() {
        let mut catalog = MemoryCatalog::new();
        let first = register_upload(&mut catalog, b"version one", "report.pdf", now()).unwrap();
        register_upload(&mut catalog, b"version one", "copy.pdf", now()).unwrap();

        let err = register_upload(&mut catalog, b"version two", "report.pdf", now()).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref path } if path == "report.pdf"));

        assert_eq!(catalog.len(), 1);
        let record = catalog.find_by_hash(&first.hash).unwrap().unwrap();
        assert_eq!(record.path, "report.pdf");
        assert!(record.duplicate_names.contains("copy.pdf"));
    }
}
