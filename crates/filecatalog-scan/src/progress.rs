//! Scan progress reporting.

use std::path::PathBuf;
use std::time::Duration;

/// Progress information during a scan.
///
/// `estimated_total` comes from the counting pass; the tree may change in
/// between, so `fraction` can exceed 1.0.
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    /// Files handled so far, hashed or unchanged.
    pub files_processed: u64,
    /// Files hashed so far.
    pub files_hashed: u64,
    /// Files skipped as unchanged so far.
    pub files_unchanged: u64,
    /// Paths bypassed so far.
    pub files_bypassed: u64,
    /// File count from the counting pass.
    pub estimated_total: u64,
    /// Most recent file handled.
    pub current_path: PathBuf,
    /// Time elapsed since the scan pass started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new(estimated_total: u64) -> Self {
        Self {
            estimated_total,
            ..Self::default()
        }
    }

    /// Processed over estimated, or `None` before anything was counted.
    pub fn fraction(&self) -> Option<f64> {
        (self.estimated_total > 0)
            .then(|| self.files_processed as f64 / self.estimated_total as f64)
    }

    /// [`Self::fraction`] as a percentage.
    pub fn percent(&self) -> Option<f64> {
        self.fraction().map(|f| f * 100.0)
    }

    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_processed as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_without_estimate() {
        let progress = ScanProgress::new(0);
        assert_eq!(progress.fraction(), None);
    }

    #[test]
    fn test_fraction_may_exceed_one() {
        let progress = ScanProgress {
            files_processed: 15,
            ..ScanProgress::new(10)
        };
        assert_eq!(progress.fraction(), Some(1.5));
        assert_eq!(progress.percent(), Some(150.0));
    }

    #[test]
    fn test_files_per_second() {
        let progress = ScanProgress {
            files_processed: 50,
            elapsed: Duration::from_secs(2),
            ..ScanProgress::new(100)
        };
        assert_eq!(progress.files_per_second(), 25.0);
        assert_eq!(ScanProgress::new(1).files_per_second(), 0.0);
    }
}
