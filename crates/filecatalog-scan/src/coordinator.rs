//! Two-phase incremental scan of a configured root.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use filecatalog_core::{
    BypassKind, CatalogStore, RecordFields, ScanConfig, ScanError, ScanResult,
};

use crate::fingerprint::FileFingerprinter;
use crate::progress::ScanProgress;
use crate::state::ScanStateStore;
use crate::walker::{Descend, DirectoryWalker, WalkVisitor, modified_utc, path_string};

/// Runs the counting pass and the incremental pass over one root.
pub struct ScanCoordinator {
    config: ScanConfig,
    walker: DirectoryWalker,
    fingerprinter: FileFingerprinter,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl ScanCoordinator {
    /// Create a coordinator, rejecting invalid settings up front.
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        let walker = DirectoryWalker::from_config(&config)?;
        let fingerprinter = FileFingerprinter::with_chunk_size(config.chunk_size);
        let (progress_tx, _) = broadcast::channel(100);
        Ok(Self {
            config,
            walker,
            fingerprinter,
            progress_tx,
        })
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Count the files under the root without touching the catalog.
    pub fn estimate(&self) -> Result<u64, ScanError> {
        self.estimate_with(&self.resolved_walker())
    }

    /// Bring the catalog up to date with the files under the root.
    ///
    /// Classified filesystem failures are recorded in the result and the
    /// scan carries on. Any other I/O failure, or a catalog failure, ends
    /// the scan with an error; records written before that point remain.
    pub fn scan<S: CatalogStore + ?Sized>(&self, store: &mut S) -> Result<ScanResult, ScanError> {
        let walker = self.resolved_walker();

        info!(root = %walker.root().display(), "Estimating file count");
        let estimated_total = self.estimate_with(&walker)?;

        info!(root = %walker.root().display(), estimated_total, "Starting incremental scan");
        let start = Instant::now();
        let mut pass = ScanPass {
            config: &self.config,
            fingerprinter: &self.fingerprinter,
            state: ScanStateStore::new(store),
            result: ScanResult {
                estimated_total,
                ..ScanResult::new()
            },
            progress_tx: &self.progress_tx,
            start,
            current_path: PathBuf::new(),
        };

        walker.walk(&mut pass)?;
        pass.result.elapsed = start.elapsed();
        pass.publish();

        let result = pass.result;
        info!(
            scanned = result.files_scanned,
            unchanged = result.files_unchanged,
            directories_unchanged = result.directories_unchanged,
            bypassed = result.files_bypassed,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "Scan complete"
        );
        Ok(result)
    }

    fn estimate_with(&self, walker: &DirectoryWalker) -> Result<u64, ScanError> {
        let mut counter = FileCounter::default();
        walker.walk(&mut counter)?;
        debug!(files = counter.files, "Estimate complete");
        Ok(counter.files)
    }

    fn resolved_walker(&self) -> DirectoryWalker {
        self.walker.clone().with_root(resolve_root(&self.config.root))
    }
}

/// Canonical form of the root, or its absolute form if it cannot be resolved.
fn resolve_root(root: &Path) -> PathBuf {
    root.canonicalize()
        .or_else(|_| std::path::absolute(root))
        .unwrap_or_else(|_| root.to_path_buf())
}

/// Counting pass: every regular file, nothing else.
#[derive(Debug, Default)]
struct FileCounter {
    files: u64,
}

impl WalkVisitor for FileCounter {
    fn visit_file(&mut self, _path: &Path, _metadata: &Metadata) -> Result<(), ScanError> {
        self.files += 1;
        Ok(())
    }

    fn bypass(&mut self, path: &Path, kind: BypassKind) -> Result<(), ScanError> {
        trace!(path = %path.display(), %kind, "Not counted");
        Ok(())
    }
}

/// Incremental pass state.
struct ScanPass<'a, S: ?Sized> {
    config: &'a ScanConfig,
    fingerprinter: &'a FileFingerprinter,
    state: ScanStateStore<&'a mut S>,
    result: ScanResult,
    progress_tx: &'a broadcast::Sender<ScanProgress>,
    start: Instant,
    current_path: PathBuf,
}

impl<S: CatalogStore + ?Sized> ScanPass<'_, S> {
    fn hash_file(&mut self, path: &Path, metadata: &Metadata) -> Result<(), ScanError> {
        let size = metadata.len();
        if self.config.exceeds_hash_limit(size) {
            return Err(ScanError::TooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.config.max_hash_size.unwrap_or(u64::MAX),
            });
        }

        let modified = modified_utc(metadata).map_err(|e| ScanError::io(path, e))?;
        let key = path_string(path);

        if !self.state.needs_hash(&key, modified)? {
            trace!(path = %path.display(), "Unchanged");
            self.result.files_unchanged += 1;
            return Ok(());
        }

        let content_hash = self.fingerprinter.fingerprint_file(path)?;
        self.state.record_hash(
            &key,
            RecordFields {
                content_hash,
                size,
                last_modified: modified,
            },
        )?;
        trace!(path = %path.display(), hash = %content_hash, "Hashed");
        self.result.files_scanned += 1;
        Ok(())
    }

    fn tick(&mut self, path: &Path) {
        self.current_path = path.to_path_buf();
        let interval = self.config.progress_interval;
        if interval > 0 && self.result.files_processed() % interval == 0 {
            self.publish();
        }
    }

    fn publish(&self) {
        let _ = self.progress_tx.send(ScanProgress {
            files_processed: self.result.files_processed(),
            files_hashed: self.result.files_scanned,
            files_unchanged: self.result.files_unchanged,
            files_bypassed: self.result.files_bypassed,
            estimated_total: self.result.estimated_total,
            current_path: self.current_path.clone(),
            elapsed: self.start.elapsed(),
        });
    }
}

impl<S: CatalogStore + ?Sized> WalkVisitor for ScanPass<'_, S> {
    fn enter_directory(&mut self, dir: &Path, metadata: &Metadata) -> Result<Descend, ScanError> {
        if !self.config.skip_unchanged_directories {
            return Ok(Descend::Into);
        }

        let modified = modified_utc(metadata).map_err(|e| ScanError::io(dir, e))?;
        if self.state.directory_unchanged(&path_string(dir), modified)? {
            debug!(path = %dir.display(), "Directory unchanged, skipping subtree");
            self.result.directories_unchanged += 1;
            return Ok(Descend::Skip);
        }
        Ok(Descend::Into)
    }

    fn visit_file(&mut self, path: &Path, metadata: &Metadata) -> Result<(), ScanError> {
        self.hash_file(path, metadata)?;
        self.tick(path);
        Ok(())
    }

    fn bypass(&mut self, path: &Path, kind: BypassKind) -> Result<(), ScanError> {
        warn!(path = %path.display(), %kind, "Bypassing inaccessible path");
        self.result.record_bypass(path_string(path));
        Ok(())
    }

    fn leave_directory(&mut self, dir: &Path, listing_started: DateTime<Utc>) -> Result<(), ScanError> {
        self.state.mark_directory(&path_string(dir), listing_started)?;
        Ok(())
    }
}
