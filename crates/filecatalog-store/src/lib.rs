//! Catalog storage backends for filecatalog.
//!
//! Two implementations of [`CatalogStore`] are provided:
//!
//! - [`MemoryCatalog`] keeps everything in process; used for stateless scans
//!   and tests.
//! - [`SqliteCatalog`] persists records and directory markers in a SQLite
//!   database so later scans can skip unchanged files.
//!
//! ```rust,no_run
//! use filecatalog_store::{CatalogStore, SqliteCatalog};
//!
//! let catalog = SqliteCatalog::open("catalog.db").unwrap();
//! for record in catalog.records().unwrap() {
//!     println!("{} {}", record.content_hash, record.path);
//! }
//! ```

mod memory;
mod sqlite;

pub use memory::MemoryCatalog;
pub use sqlite::SqliteCatalog;

pub use filecatalog_core::{
    CatalogStore, ContentHash, DirectoryMarker, FileRecord, RecordFields, StoreError,
};
