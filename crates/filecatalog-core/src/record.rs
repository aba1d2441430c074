//! Catalog record types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// BLAKE3 content hash used as the identity of a file's bytes.
///
/// Serialized as a 64-character lowercase hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub [u8; 32]);

/// Error returned when parsing a hex digest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashParseError {
    #[error("expected 64 hex characters, got {0}")]
    Length(usize),
    #[error("invalid hex character {0:?}")]
    Character(char),
}

impl ContentHash {
    /// Length of the hex representation.
    pub const HEX_LEN: usize = 64;

    /// Create a new ContentHash from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a hex digest. Upper-case input is accepted.
    pub fn from_hex(hex: &str) -> Result<Self, HashParseError> {
        if hex.len() != Self::HEX_LEN {
            return Err(HashParseError::Length(hex.len()));
        }

        let mut bytes = [0u8; 32];
        let digits = hex.as_bytes();
        for (i, byte) in bytes.iter_mut().enumerate() {
            let hi = hex_value(digits[i * 2])?;
            let lo = hex_value(digits[i * 2 + 1])?;
            *byte = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

fn hex_value(c: u8) -> Result<u8, HashParseError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(HashParseError::Character(c as char)),
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for ContentHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// A hashed file in the catalog, keyed by its path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path (or upload name), unique within the catalog.
    pub path: String,
    /// Digest of the file's full contents.
    pub content_hash: ContentHash,
    /// Size in bytes at hashing time.
    pub size: u64,
    /// Modification time observed when the file was hashed.
    pub last_modified: DateTime<Utc>,
    /// Upload names that resolved to this content, in first-seen order.
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub duplicate_names: IndexSet<String>,
}

impl FileRecord {
    /// Create a record with no duplicate names.
    pub fn new(
        path: impl Into<String>,
        content_hash: ContentHash,
        size: u64,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            content_hash,
            size,
            last_modified,
            duplicate_names: IndexSet::new(),
        }
    }

    /// Whether the stored modification time covers `on_disk`.
    ///
    /// Equal timestamps count as unchanged.
    pub fn is_current(&self, on_disk: DateTime<Utc>) -> bool {
        self.last_modified >= on_disk
    }
}

/// Records when a directory's direct entries were last fully enumerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryMarker {
    pub path: String,
    pub last_scanned_at: DateTime<Utc>,
}

impl DirectoryMarker {
    pub fn new(path: impl Into<String>, last_scanned_at: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            last_scanned_at,
        }
    }

    /// Whether the directory's mtime predates (or equals) the last scan.
    pub fn is_current(&self, directory_mtime: DateTime<Utc>) -> bool {
        self.last_scanned_at >= directory_mtime
    }
}
