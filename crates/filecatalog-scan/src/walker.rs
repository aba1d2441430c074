//! Explicit-stack directory traversal.

use std::ffi::OsStr;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, trace};

use filecatalog_core::{BypassKind, ScanConfig, ScanError};

use crate::inode::{DirectoryId, InodeTracker};

/// Whether the walker should list a directory it has just stat'ed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descend {
    /// List the directory and queue its subdirectories.
    Into,
    /// Leave the directory and its whole subtree unvisited.
    Skip,
}

/// Callbacks driven by [`DirectoryWalker::walk`].
///
/// Errors returned from `visit_file` that classify as a [`BypassKind`] are
/// turned into a `bypass` call by the walker; anything else ends the walk.
pub trait WalkVisitor {
    /// Called after a directory is stat'ed and before it is listed.
    fn enter_directory(&mut self, _dir: &Path, _metadata: &Metadata) -> Result<Descend, ScanError> {
        Ok(Descend::Into)
    }

    /// Called for every regular file in a listed directory.
    fn visit_file(&mut self, path: &Path, metadata: &Metadata) -> Result<(), ScanError>;

    /// Called for every path skipped because of a classified error.
    fn bypass(&mut self, path: &Path, kind: BypassKind) -> Result<(), ScanError>;

    /// Called once every direct entry of `dir` has been handled.
    ///
    /// `listing_started` is the time just before the directory was read.
    fn leave_directory(
        &mut self,
        _dir: &Path,
        _listing_started: DateTime<Utc>,
    ) -> Result<(), ScanError> {
        Ok(())
    }
}

/// Counters for one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub directories_listed: u64,
    pub directories_skipped: u64,
    pub files_visited: u64,
    pub bypassed: u64,
    pub special_files: u64,
    pub revisits_prevented: u64,
}

/// Depth-first walker over a pending-directory stack.
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    root: PathBuf,
    ignore: Option<GlobSet>,
    track_visited: bool,
}

impl DirectoryWalker {
    /// Create a walker with no ignore patterns.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore: None,
            track_visited: false,
        }
    }

    /// Create a walker from scan settings, compiling its ignore patterns.
    pub fn from_config(config: &ScanConfig) -> Result<Self, ScanError> {
        let walker = Self::new(&config.root)
            .with_ignore_patterns(config.ignore_patterns.as_slice())?
            .with_visited_tracking(config.track_visited_directories);
        Ok(walker)
    }

    /// Skip entries whose name matches any of `patterns`.
    pub fn with_ignore_patterns<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, ScanError> {
        if patterns.is_empty() {
            self.ignore = None;
            return Ok(self);
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern.as_ref()).map_err(|e| ScanError::InvalidConfig {
                message: format!("Invalid ignore pattern '{}': {e}", pattern.as_ref()),
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| ScanError::InvalidConfig {
            message: format!("Invalid ignore patterns: {e}"),
        })?;
        self.ignore = Some(set);
        Ok(self)
    }

    /// Refuse to enter a directory whose identity was already entered.
    pub fn with_visited_tracking(mut self, enabled: bool) -> Self {
        self.track_visited = enabled;
        self
    }

    /// Same settings, different root.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// The root this walker starts from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether an entry name is excluded by the ignore patterns.
    pub fn is_ignored(&self, name: &OsStr) -> bool {
        self.ignore
            .as_ref()
            .is_some_and(|set| set.is_match(Path::new(name)))
    }

    /// Walk the tree, driving `visitor`.
    ///
    /// Directories are popped last-in-first-out. Entries of one directory are
    /// handled in name order and its subdirectories are pushed after all of
    /// its files have been visited.
    pub fn walk<V: WalkVisitor + ?Sized>(&self, visitor: &mut V) -> Result<WalkStats, ScanError> {
        let mut stats = WalkStats::default();
        let mut tracker = self.track_visited.then(InodeTracker::new);
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let metadata = match fs::metadata(&dir) {
                Ok(m) => m,
                Err(e) => {
                    self.tolerate(visitor, &mut stats, &dir, e)?;
                    continue;
                }
            };

            if !metadata.is_dir() {
                stats.bypassed += 1;
                visitor.bypass(&dir, BypassKind::NotADirectory)?;
                continue;
            }

            if let Some(tracker) = &mut tracker {
                if let Some(id) = DirectoryId::from_metadata(&metadata) {
                    if !tracker.track(id) {
                        debug!(path = %dir.display(), "Directory already entered, not descending");
                        stats.revisits_prevented += 1;
                        continue;
                    }
                }
            }

            if visitor.enter_directory(&dir, &metadata)? == Descend::Skip {
                stats.directories_skipped += 1;
                continue;
            }

            let listing_started = Utc::now();
            let Some(listing) = self.list_directory(visitor, &mut stats, &dir)? else {
                continue;
            };
            if listing.complete {
                visitor.leave_directory(&dir, listing_started)?;
            } else {
                debug!(path = %dir.display(), "Listing interrupted, directory left unmarked");
            }

            pending.extend(listing.subdirs.into_iter().rev());
        }

        if let Some(tracker) = &tracker {
            debug!(
                distinct = tracker.len(),
                revisits = stats.revisits_prevented,
                "Directory identities tracked"
            );
        }
        Ok(stats)
    }

    /// List one directory, visit its files and return its subdirectories.
    ///
    /// Returns `None` when the directory itself could not be read.
    fn list_directory<V: WalkVisitor + ?Sized>(
        &self,
        visitor: &mut V,
        stats: &mut WalkStats,
        dir: &Path,
    ) -> Result<Option<Listing>, ScanError> {
        let read_dir = match fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(e) => {
                self.tolerate(visitor, stats, dir, e)?;
                return Ok(None);
            }
        };
        stats.directories_listed += 1;

        let (mut entries, complete) = self.drain_entries(visitor, stats, dir, read_dir)?;
        entries.sort_by_key(|entry| entry.file_name());

        let mut subdirs = Vec::new();
        for entry in entries {
            if self.is_ignored(&entry.file_name()) {
                trace!(path = %entry.path().display(), "Ignored by pattern");
                continue;
            }

            let path = entry.path();
            // Follows symlinks.
            let metadata = match fs::metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    self.tolerate(visitor, stats, &path, e)?;
                    continue;
                }
            };

            if metadata.is_dir() {
                subdirs.push(path);
            } else if metadata.is_file() {
                match visitor.visit_file(&path, &metadata) {
                    Ok(()) => stats.files_visited += 1,
                    Err(e) => match e.bypass_kind() {
                        Some(kind) => {
                            stats.bypassed += 1;
                            visitor.bypass(&path, kind)?;
                        }
                        None => return Err(e),
                    },
                }
            } else {
                trace!(path = %path.display(), "Skipping special file");
                stats.special_files += 1;
            }
        }

        Ok(Some(Listing { subdirs, complete }))
    }

    /// Collect directory entries, tolerating classified read errors.
    ///
    /// The flag is `false` when any entry could not be read.
    fn drain_entries<V, T>(
        &self,
        visitor: &mut V,
        stats: &mut WalkStats,
        dir: &Path,
        entries: impl IntoIterator<Item = io::Result<T>>,
    ) -> Result<(Vec<T>, bool), ScanError>
    where
        V: WalkVisitor + ?Sized,
    {
        let mut collected = Vec::new();
        let mut complete = true;
        for entry in entries {
            match entry {
                Ok(entry) => collected.push(entry),
                Err(e) => {
                    self.tolerate(visitor, stats, dir, e)?;
                    complete = false;
                }
            }
        }
        Ok((collected, complete))
    }

    /// Report a classified error as a bypass, or escalate it.
    fn tolerate<V: WalkVisitor + ?Sized>(
        &self,
        visitor: &mut V,
        stats: &mut WalkStats,
        path: &Path,
        error: io::Error,
    ) -> Result<(), ScanError> {
        match BypassKind::classify(&error) {
            Some(kind) => {
                stats.bypassed += 1;
                visitor.bypass(path, kind)
            }
            None => Err(ScanError::io(path, error)),
        }
    }
}

/// Subdirectories found in one directory listing.
struct Listing {
    subdirs: Vec<PathBuf>,
    complete: bool,
}

/// Modification time of `metadata` as UTC.
pub fn modified_utc(metadata: &Metadata) -> io::Result<DateTime<Utc>> {
    metadata.modified().map(DateTime::<Utc>::from)
}

/// Catalog key for a filesystem path.
pub fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
