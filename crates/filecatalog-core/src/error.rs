//! Error types for scanning and catalog operations.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of filesystem failure that is tolerated during a walk.
///
/// A path failing with one of these kinds is recorded as bypassed and the
/// scan moves on. Any other I/O failure is a hard fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BypassKind {
    /// Permission refused on open, list or stat.
    PermissionDenied,
    /// A path component expected to be a directory is not one.
    NotADirectory,
    /// The path vanished between listing and use.
    NotFound,
    /// Too many levels of symbolic links.
    SymlinkLoop,
    /// The file or device is locked by someone else.
    ResourceBusy,
    /// Content exceeds the hashing size threshold.
    TooLarge,
}

#[cfg(target_os = "linux")]
const ELOOP: i32 = 40;
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
const ELOOP: i32 = 62;

#[cfg(windows)]
const ERROR_SHARING_VIOLATION: i32 = 32;
#[cfg(windows)]
const ERROR_LOCK_VIOLATION: i32 = 33;
#[cfg(windows)]
const ERROR_CANT_RESOLVE_FILENAME: i32 = 1921;

impl BypassKind {
    /// Classify an I/O error, returning `None` for unexpected failures.
    pub fn classify(error: &io::Error) -> Option<Self> {
        match error.kind() {
            io::ErrorKind::PermissionDenied => return Some(Self::PermissionDenied),
            io::ErrorKind::NotADirectory => return Some(Self::NotADirectory),
            io::ErrorKind::NotFound => return Some(Self::NotFound),
            io::ErrorKind::ResourceBusy => return Some(Self::ResourceBusy),
            io::ErrorKind::FileTooLarge => return Some(Self::TooLarge),
            _ => {}
        }

        match error.raw_os_error() {
            #[cfg(any(
                target_os = "linux",
                target_os = "macos",
                target_os = "ios",
                target_os = "freebsd",
                target_os = "openbsd",
                target_os = "netbsd",
                target_os = "dragonfly"
            ))]
            Some(ELOOP) => Some(Self::SymlinkLoop),
            #[cfg(windows)]
            Some(ERROR_CANT_RESOLVE_FILENAME) => Some(Self::SymlinkLoop),
            #[cfg(windows)]
            Some(ERROR_SHARING_VIOLATION | ERROR_LOCK_VIOLATION) => Some(Self::ResourceBusy),
            _ => None,
        }
    }

    /// Short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission denied",
            Self::NotADirectory => "not a directory",
            Self::NotFound => "not found",
            Self::SymlinkLoop => "symlink loop",
            Self::ResourceBusy => "resource busy",
            Self::TooLarge => "too large",
        }
    }
}

impl std::fmt::Display for BypassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors raised by a [`CatalogStore`](crate::CatalogStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed an operation.
    #[error("Catalog backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A stored value could not be decoded.
    #[error("Corrupt catalog entry for {key}: {message}")]
    Corrupt { key: String, message: String },

    /// Another record already occupies the target path.
    #[error("Catalog already holds a different record at {path}")]
    Conflict { path: String },

    /// The catalog location could not be prepared.
    #[error("Catalog I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// Wrap a backend-specific error.
    pub fn backend(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend {
            source: Box::new(source),
        }
    }

    pub fn conflict(path: impl Into<String>) -> Self {
        Self::Conflict { path: path.into() }
    }

    /// Report an undecodable stored value.
    pub fn corrupt(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Errors that can occur during scanning, hashing and verification.
#[derive(Debug, Error)]
pub enum ScanError {
    /// I/O error with path context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File exceeds the configured hashing threshold.
    #[error("File too large to hash: {path} ({size} bytes, limit {limit})")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    /// The catalog failed; the scan cannot continue.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The bypass kind this error maps to, or `None` for a hard fault.
    pub fn bypass_kind(&self) -> Option<BypassKind> {
        match self {
            Self::Io { source, .. } => BypassKind::classify(source),
            Self::TooLarge { .. } => Some(BypassKind::TooLarge),
            Self::Store(_) | Self::InvalidConfig { .. } => None,
        }
    }

    /// The filesystem path involved, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Io { path, .. } | Self::TooLarge { path, .. } => Some(path),
            _ => None,
        }
    }
}
