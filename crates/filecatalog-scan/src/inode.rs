//! Directory identity tracking for cycle protection.

use std::collections::HashSet;
use std::fs::Metadata;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

/// Filesystem identity of a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectoryId {
    pub device: u64,
    pub inode: u64,
}

impl DirectoryId {
    pub fn new(device: u64, inode: u64) -> Self {
        Self { device, inode }
    }

    /// Identity from metadata, where the platform exposes one.
    #[cfg(unix)]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        Some(Self::new(metadata.dev(), metadata.ino()))
    }

    #[cfg(not(unix))]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

/// Tracks entered directories so the same one is never listed twice.
///
/// A symlink pointing back at an ancestor produces ever-longer paths that
/// all resolve to the same (device, inode) pair; only the first is entered.
#[derive(Debug, Default)]
pub struct InodeTracker {
    seen: HashSet<DirectoryId>,
}

impl InodeTracker {
    /// Create a new tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a directory. Returns `true` if this is the first time seeing it.
    pub fn track(&mut self, id: DirectoryId) -> bool {
        self.seen.insert(id)
    }

    /// Get the number of unique directories tracked.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if nothing has been tracked.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
