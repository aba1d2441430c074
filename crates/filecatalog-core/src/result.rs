//! Scan outcome aggregation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome of one incremental scan of a root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Files actually (re)hashed during this run.
    pub files_scanned: u64,
    /// Files whose stored modification time was still current.
    pub files_unchanged: u64,
    /// Directories skipped because their marker was still current.
    pub directories_unchanged: u64,
    /// Files and directories skipped for a classified error.
    pub files_bypassed: u64,
    /// One entry per bypass, in the order encountered.
    pub inaccessible_paths: Vec<String>,
    /// File count from the estimate pass.
    pub estimated_total: u64,
    /// Wall-clock duration of the scan pass.
    pub elapsed: Duration,
}

impl ScanResult {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a bypassed path.
    pub fn record_bypass(&mut self, path: impl Into<String>) {
        self.files_bypassed += 1;
        self.inaccessible_paths.push(path.into());
    }

    /// Files visited in the scan pass, hashed or not.
    pub fn files_processed(&self) -> u64 {
        self.files_scanned + self.files_unchanged
    }

    /// Whether nothing was bypassed.
    pub fn is_complete(&self) -> bool {
        self.files_bypassed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_bypass_keeps_order_and_repeats() {
        let mut result = ScanResult::new();
        result.record_bypass("/a");
        result.record_bypass("/b");
        result.record_bypass("/a");

        assert_eq!(result.files_bypassed, 3);
        assert_eq!(result.inaccessible_paths, vec!["/a", "/b", "/a"]);
        assert!(!result.is_complete());
    }

    #[test]
    fn test_files_processed() {
        let result = ScanResult {
            files_scanned: 3,
            files_unchanged: 4,
            ..ScanResult::default()
        };
        assert_eq!(result.files_processed(), 7);
        assert!(result.is_complete());
    }
}
