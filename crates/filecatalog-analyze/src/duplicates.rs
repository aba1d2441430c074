//! Duplicate detection over catalog records.
//!
//! The catalog already carries a content hash per file, so grouping is a
//! single partition of the records by hash. No file is read again.

use std::cmp::Reverse;

use derive_builder::Builder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use filecatalog_core::{CatalogStore, ContentHash, FileRecord, StoreError};

/// Configuration for duplicate detection.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct DuplicateConfig {
    /// Minimum file size to consider.
    #[builder(default = "0")]
    pub min_size: u64,

    /// Maximum file size to consider.
    #[builder(default = "u64::MAX")]
    pub max_size: u64,

    /// Maximum number of groups to return (0 = unlimited).
    #[builder(default = "0")]
    pub max_groups: usize,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            min_size: 0,
            max_size: u64::MAX,
            max_groups: 0,
        }
    }
}

impl DuplicateConfig {
    /// Create a new config builder.
    pub fn builder() -> DuplicateConfigBuilder {
        DuplicateConfigBuilder::default()
    }
}

/// A group of catalog records sharing the same content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Content hash shared by all files in this group.
    pub hash: ContentHash,

    /// Size of each file in bytes.
    pub size: u64,

    /// Paths of all files in the group, sorted.
    pub paths: Vec<String>,

    /// Wasted space: size * (count - 1).
    pub wasted_bytes: u64,
}

impl DuplicateGroup {
    /// Get the number of duplicate files.
    pub fn count(&self) -> usize {
        self.paths.len()
    }

    /// Check if keeping one file, how many could be deleted.
    pub fn deletable_count(&self) -> usize {
        self.paths.len().saturating_sub(1)
    }
}

/// Results from duplicate analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Groups of duplicate files, sorted by wasted space descending.
    pub groups: Vec<DuplicateGroup>,

    /// Total size of all duplicate files.
    pub total_duplicate_size: u64,

    /// Total wasted space (could be reclaimed).
    pub total_wasted_space: u64,

    /// Number of records analyzed.
    pub files_analyzed: u64,

    /// Number of files that have duplicates.
    pub files_with_duplicates: u64,

    /// Number of unique duplicate groups.
    pub group_count: usize,
}

impl DuplicateReport {
    /// Check if any duplicates were found.
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Get total number of duplicate files across all groups.
    pub fn total_duplicate_files(&self) -> usize {
        self.groups.iter().map(|g| g.paths.len()).sum()
    }
}

/// Groups catalog records by content hash.
#[derive(Debug, Clone, Default)]
pub struct DuplicateIndex {
    config: DuplicateConfig,
}

impl DuplicateIndex {
    /// Create an index with default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index with custom config.
    pub fn with_config(config: DuplicateConfig) -> Self {
        Self { config }
    }

    /// Group every record in `store`.
    pub fn find_duplicates<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<DuplicateReport, StoreError> {
        Ok(self.group_records(store.records()?))
    }

    /// Group `records` by content hash; groups of two or more are duplicates.
    pub fn group_records(&self, records: impl IntoIterator<Item = FileRecord>) -> DuplicateReport {
        let files: Vec<FileRecord> = records
            .into_iter()
            .filter(|r| r.size >= self.config.min_size && r.size <= self.config.max_size)
            .collect();
        let files_analyzed = files.len() as u64;

        let mut groups: Vec<DuplicateGroup> = files
            .into_iter()
            .into_group_map_by(|r| r.content_hash)
            .into_iter()
            .filter(|(_, members)| members.len() >= 2)
            .map(|(hash, members)| {
                let size = members.iter().map(|r| r.size).max().unwrap_or(0);
                let paths: Vec<String> = members.into_iter().map(|r| r.path).sorted().collect();
                let wasted_bytes = size.saturating_mul(paths.len() as u64 - 1);
                DuplicateGroup {
                    hash,
                    size,
                    paths,
                    wasted_bytes,
                }
            })
            .collect();

        groups.sort_by_key(|g| (Reverse(g.wasted_bytes), g.hash));

        if self.config.max_groups > 0 && groups.len() > self.config.max_groups {
            groups.truncate(self.config.max_groups);
        }

        let total_duplicate_size = groups
            .iter()
            .map(|g| g.size.saturating_mul(g.paths.len() as u64))
            .fold(0u64, u64::saturating_add);
        let total_wasted_space = groups
            .iter()
            .map(|g| g.wasted_bytes)
            .fold(0u64, u64::saturating_add);
        let files_with_duplicates: u64 = groups.iter().map(|g| g.paths.len() as u64).sum();
        let group_count = groups.len();

        DuplicateReport {
            groups,
            total_duplicate_size,
            total_wasted_space,
            files_analyzed,
            files_with_duplicates,
            group_count,
        }
    }
}
