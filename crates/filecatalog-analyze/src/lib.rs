//! Analysis operations over a filecatalog catalog.
//!
//! - **Duplicate detection** - Group catalog records by content hash
//! - **Upload dedup** - Register uploaded blobs against existing content
//! - **Folder verification** - Hash a folder from scratch and write a JSON artifact
//! - **Export** - Stream the catalog as newline-delimited JSON
//!
//! # Duplicate Detection
//!
//! ```rust,no_run
//! use filecatalog_analyze::DuplicateIndex;
//! use filecatalog_store::SqliteCatalog;
//!
//! let catalog = SqliteCatalog::open("catalog.db").unwrap();
//! let report = DuplicateIndex::new().find_duplicates(&catalog).unwrap();
//!
//! println!("Found {} duplicate groups", report.group_count);
//! println!("Wasted space: {} bytes", report.total_wasted_space);
//! ```
//!
//! # Folder Verification
//!
//! ```rust,no_run
//! use std::path::Path;
//! use filecatalog_analyze::{DEFAULT_ARTIFACT, FolderVerifier};
//!
//! let report = FolderVerifier::new()
//!     .verify_to(Path::new("/srv/incoming"), Path::new(DEFAULT_ARTIFACT))
//!     .unwrap();
//!
//! for file in &report.files {
//!     println!("{} {}", file.hash, file.path);
//! }
//! ```

mod duplicates;
mod error;
mod export;
mod upload;
mod verify;

pub use duplicates::{
    DuplicateConfig, DuplicateConfigBuilder, DuplicateGroup, DuplicateIndex, DuplicateReport,
};
pub use error::AnalyzeError;
pub use export::export_ndjson;
pub use upload::{UploadOutcome, register_upload};
pub use verify::{
    DEFAULT_ARTIFACT, FolderVerifier, SkippedPath, VerificationReport, VerifiedFile,
    write_artifact,
};

// Re-export core types
pub use filecatalog_core::{ContentHash, FileRecord};
