//! Core types and traits for filecatalog.
//!
//! This crate provides the fundamental data structures shared by the
//! filecatalog crates: catalog records, scan results, the error taxonomy,
//! scan configuration and the [`CatalogStore`] abstraction every persistence
//! backend implements.

mod config;
mod error;
mod record;
mod result;
mod store;

pub use config::{ScanConfig, ScanConfigBuilder};
pub use error::{BypassKind, ScanError, StoreError};
pub use record::{ContentHash, DirectoryMarker, FileRecord, HashParseError};
pub use result::ScanResult;
pub use store::{CatalogStore, RecordFields};
