//! Stateless folder verification.
//!
//! Every file under a folder is listed and hashed afresh; the catalog is not
//! consulted. The listing is sequential, hashing runs on the rayon pool.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SubsecRound, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use filecatalog_core::{BypassKind, ContentHash, ScanError};
use filecatalog_scan::{DirectoryWalker, FileFingerprinter, WalkVisitor, modified_utc, path_string};

use crate::error::AnalyzeError;

/// Default artifact file name, relative to the working directory.
pub const DEFAULT_ARTIFACT: &str = "file-hashes.json";

/// One hashed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedFile {
    pub path: String,
    pub hash: ContentHash,
    pub size: u64,
    /// Millisecond precision, serialized as `YYYY-MM-DDTHH:MM:SS.sssZ`.
    #[serde(with = "iso_millis")]
    pub last_modified: DateTime<Utc>,
}

/// A path left out of the verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPath {
    pub path: String,
    pub kind: BypassKind,
}

/// Outcome of verifying one folder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Hashed files, sorted by path.
    pub files: Vec<VerifiedFile>,
    /// Paths skipped for a classified filesystem error, in walk order.
    pub skipped: Vec<SkippedPath>,
}

impl VerificationReport {
    /// Total bytes hashed.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Hashes every file under a folder.
#[derive(Debug, Clone, Default)]
pub struct FolderVerifier {
    fingerprinter: FileFingerprinter,
}

impl FolderVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            fingerprinter: FileFingerprinter::with_chunk_size(chunk_size),
        }
    }

    /// List and hash every regular file under `folder`.
    ///
    /// The folder itself must exist and be a directory; failures below it
    /// that classify as a [`BypassKind`] end up in
    /// [`VerificationReport::skipped`].
    pub fn verify(&self, folder: &Path) -> Result<VerificationReport, AnalyzeError> {
        let root = folder.canonicalize().map_err(|e| ScanError::io(folder, e))?;
        let metadata = fs::metadata(&root).map_err(|e| ScanError::io(&root, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::io(
                &root,
                io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
            )
            .into());
        }

        let mut listing = Listing::default();
        DirectoryWalker::new(&root).walk(&mut listing)?;
        info!(root = %root.display(), files = listing.files.len(), "Verifying folder");

        let hashed: Vec<(ListedFile, Result<ContentHash, ScanError>)> = listing
            .files
            .into_par_iter()
            .map(|file| {
                let hash = self.fingerprinter.fingerprint_file(&file.path);
                (file, hash)
            })
            .collect();

        let mut report = VerificationReport {
            files: Vec::with_capacity(hashed.len()),
            skipped: listing.skipped,
        };
        for (file, hash) in hashed {
            match hash {
                Ok(hash) => report.files.push(VerifiedFile {
                    path: path_string(&file.path),
                    hash,
                    size: file.size,
                    last_modified: file.modified,
                }),
                Err(e) => match e.bypass_kind() {
                    Some(kind) => {
                        warn!(path = %file.path.display(), %kind, "Skipping file");
                        report.skipped.push(SkippedPath {
                            path: path_string(&file.path),
                            kind,
                        });
                    }
                    None => return Err(e.into()),
                },
            }
        }
        report.files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(report)
    }

    /// Verify `folder` and write the file list to `artifact` as pretty JSON.
    pub fn verify_to(
        &self,
        folder: &Path,
        artifact: &Path,
    ) -> Result<VerificationReport, AnalyzeError> {
        let report = self.verify(folder)?;
        write_artifact(&report.files, artifact)?;
        Ok(report)
    }
}

/// Write `files` to `path` as a pretty-printed JSON array.
pub fn write_artifact(files: &[VerifiedFile], path: &Path) -> Result<(), AnalyzeError> {
    let json = serde_json::to_string_pretty(files)?;
    fs::write(path, json).map_err(|source| AnalyzeError::Artifact {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), files = files.len(), "Wrote verification artifact");
    Ok(())
}

#[derive(Debug)]
struct ListedFile {
    path: PathBuf,
    size: u64,
    modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Listing {
    files: Vec<ListedFile>,
    skipped: Vec<SkippedPath>,
}

impl WalkVisitor for Listing {
    fn visit_file(&mut self, path: &Path, metadata: &Metadata) -> Result<(), ScanError> {
        let modified = modified_utc(metadata).map_err(|e| ScanError::io(path, e))?;
        self.files.push(ListedFile {
            path: path.to_path_buf(),
            size: metadata.len(),
            modified: modified.trunc_subsecs(3),
        });
        Ok(())
    }

    fn bypass(&mut self, path: &Path, kind: BypassKind) -> Result<(), ScanError> {
        warn!(path = %path.display(), %kind, "Skipping path");
        self.skipped.push(SkippedPath {
            path: path_string(path),
            kind,
        });
        Ok(())
    }
}

mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_verified_file_json_shape() {
        let file = VerifiedFile {
            path: "/data/a.txt".to_string(),
            hash: ContentHash::new([0xab; 32]),
            size: 5,
            last_modified: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
        };

        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(value["path"], "/data/a.txt");
        assert_eq!(value["hash"], "ab".repeat(32));
        assert_eq!(value["size"], 5);
        assert_eq!(value["lastModified"], "2023-11-14T22:13:20.123Z");

        let back: VerifiedFile = serde_json::from_value(value).unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn test_missing_folder_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = FolderVerifier::new()
            .verify(&temp.path().join("missing"))
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::Scan(ScanError::Io { .. })));
    }

    #[test]
    fn test_file_is_not_a_folder() {
        let temp = tempfile::TempDir::new().unwrap();
        let file = temp.path().join("plain.txt");
        fs::write(&file, "x").unwrap();

        let err = FolderVerifier::new().verify(&file).unwrap_err();
        match err {
            AnalyzeError::Scan(ScanError::Io { source, .. }) => {
                assert_eq!(source.kind(), io::ErrorKind::NotADirectory)
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
