//! Error type for analysis operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use filecatalog_core::{ScanError, StoreError};

/// Errors from verification, export and catalog analysis.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to write an artifact file.
    #[error("Failed to write {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write to an output stream.
    #[error("Output error: {0}")]
    Output(#[from] io::Error),
}
