//! Streaming content hashing.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use blake3::Hasher;

use filecatalog_core::{ContentHash, ScanError};

/// Computes BLAKE3 digests of file contents in bounded chunks.
///
/// Only one chunk-sized buffer is held at a time, so memory use does not
/// depend on file size.
#[derive(Debug, Clone)]
pub struct FileFingerprinter {
    chunk_size: usize,
}

impl FileFingerprinter {
    /// Default read buffer size.
    pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

    /// Create a fingerprinter with the default chunk size.
    pub fn new() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
        }
    }

    /// Create a fingerprinter reading `chunk_size` bytes at a time.
    ///
    /// A zero size is bumped to one byte.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Configured read buffer size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Hash the file at `path`.
    ///
    /// A failure to open or read aborts with the originating error; no
    /// partial digest is ever returned.
    pub fn fingerprint_file(&self, path: &Path) -> Result<ContentHash, ScanError> {
        let file = File::open(path).map_err(|e| ScanError::io(path, e))?;
        self.fingerprint_reader(file)
            .map_err(|e| ScanError::io(path, e))
    }

    /// Fold every chunk of `reader` into a digest.
    pub fn fingerprint_reader<R: Read>(&self, mut reader: R) -> io::Result<ContentHash> {
        let mut hasher = Hasher::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(ContentHash::new(*hasher.finalize().as_bytes()))
    }

    /// Hash an in-memory blob with the same digest as file contents.
    pub fn fingerprint_bytes(bytes: &[u8]) -> ContentHash {
        ContentHash::new(*blake3::hash(bytes).as_bytes())
    }
}

impl Default for FileFingerprinter {
    fn default() -> Self {
        Self::new()
    }
}
