//! Scan configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Configuration for scanning operations.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root path to scan.
    pub root: PathBuf,

    /// Read buffer size used while hashing.
    #[builder(default = "default_chunk_size()")]
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Files larger than this are bypassed instead of hashed.
    #[builder(default)]
    #[serde(default)]
    pub max_hash_size: Option<u64>,

    /// Skip listing directories whose marker is newer than their mtime.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub skip_unchanged_directories: bool,

    /// Refuse to enter the same (device, inode) directory twice.
    #[builder(default = "false")]
    #[serde(default)]
    pub track_visited_directories: bool,

    /// Entry names to skip (glob syntax).
    #[builder(default)]
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Publish a progress snapshot every N files.
    #[builder(default = "default_progress_interval()")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

fn default_true() -> bool {
    true
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_progress_interval() -> u64 {
    100
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref root) = self.root {
            if root.as_os_str().is_empty() {
                return Err("Root path cannot be empty".to_string());
            }
        } else {
            return Err("Root path is required".to_string());
        }
        if self.chunk_size == Some(0) {
            return Err("Chunk size must be positive".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: default_chunk_size(),
            max_hash_size: None,
            skip_unchanged_directories: true,
            track_visited_directories: false,
            ignore_patterns: Vec::new(),
            progress_interval: default_progress_interval(),
        }
    }

    /// Check invariants for configs that did not go through the builder.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.root.as_os_str().is_empty() {
            return Err(ScanError::InvalidConfig {
                message: "Root path cannot be empty".to_string(),
            });
        }
        if self.chunk_size == 0 {
            return Err(ScanError::InvalidConfig {
                message: "Chunk size must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Whether a file of `size` bytes exceeds the hashing threshold.
    pub fn exceeds_hash_limit(&self, size: u64) -> bool {
        self.max_hash_size.is_some_and(|limit| size > limit)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ScanConfig::builder()
            .root("/home/user")
            .chunk_size(4096usize)
            .skip_unchanged_directories(false)
            .build()
            .unwrap();

        assert_eq!(config.root, PathBuf::from("/home/user"));
        assert_eq!(config.chunk_size, 4096);
        assert!(!config.skip_unchanged_directories);
        assert!(!config.track_visited_directories);
    }

    #[test]
    fn test_builder_rejects_zero_chunk() {
        let err = ScanConfig::builder()
            .root("/data")
            .chunk_size(0usize)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Chunk size"));
    }

    #[test]
    fn test_builder_requires_root() {
        assert!(ScanConfig::builder().build().is_err());
    }

    #[test]
    fn test_config_simple() {
        let config = ScanConfig::new("/home/user");
        assert_eq!(config.root, PathBuf::from("/home/user"));
        assert!(config.skip_unchanged_directories);
        assert_eq!(config.max_hash_size, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_hash_limit() {
        let mut config = ScanConfig::new("/data");
        assert!(!config.exceeds_hash_limit(u64::MAX));

        config.max_hash_size = Some(1024);
        assert!(!config.exceeds_hash_limit(1024));
        assert!(config.exceeds_hash_limit(1025));
    }
}
