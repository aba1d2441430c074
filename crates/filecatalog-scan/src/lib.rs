//! Incremental scanning engine for filecatalog.
//!
//! # Overview
//!
//! `filecatalog-scan` walks a directory tree, fingerprints file contents and
//! keeps a [`CatalogStore`] up to date. Key features:
//!
//! - **Explicit-stack traversal** that survives per-entry filesystem errors
//! - **Streaming BLAKE3 hashing** in bounded chunks
//! - **Incremental re-scans** driven by stored modification times
//! - **Progress updates** via broadcast channels
//!
//! # Example
//!
//! ```rust,no_run
//! use filecatalog_scan::{ScanConfig, ScanCoordinator};
//! use filecatalog_store::SqliteCatalog;
//!
//! let mut catalog = SqliteCatalog::open("catalog.db").unwrap();
//! let coordinator = ScanCoordinator::new(ScanConfig::new("/srv/data")).unwrap();
//! let result = coordinator.scan(&mut catalog).unwrap();
//!
//! println!("Hashed {} files", result.files_scanned);
//! println!("Bypassed {} paths", result.files_bypassed);
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use filecatalog_scan::{ScanConfig, ScanCoordinator};
//!
//! let coordinator = ScanCoordinator::new(ScanConfig::new("/srv/data")).unwrap();
//! let mut progress_rx = coordinator.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(progress) = progress_rx.blocking_recv() {
//!         println!("{} files processed", progress.files_processed);
//!     }
//! });
//! ```

mod coordinator;
mod fingerprint;
mod inode;
mod progress;
mod state;
mod walker;

pub use coordinator::ScanCoordinator;
pub use fingerprint::FileFingerprinter;
pub use inode::{DirectoryId, InodeTracker};
pub use progress::ScanProgress;
pub use state::ScanStateStore;
pub use walker::{Descend, DirectoryWalker, WalkStats, WalkVisitor, modified_utc, path_string};

// Re-export core types for convenience
pub use filecatalog_core::{
    BypassKind, CatalogStore, ContentHash, FileRecord, RecordFields, ScanConfig, ScanError,
    ScanResult,
};
