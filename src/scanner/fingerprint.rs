//! BLAKE3 file fingerprinting with whole-read and chunked strategies.
//!
//! # Overview
//!
//! [`Fingerprinter`] computes a fixed-width content digest for one file.
//! Files above the large-file threshold are streamed through the hasher in
//! fixed-size chunks so peak memory stays at one chunk; smaller files are
//! read in one call. Both strategies produce identical digests for
//! identical content.
//!
//! # Example
//!
//! ```no_run
//! use dupescan::scanner::Fingerprinter;
//! use std::path::Path;
//!
//! let fingerprinter = Fingerprinter::new();
//! let path = Path::new("Cargo.toml");
//! let size = std::fs::metadata(path).unwrap().len();
//! let fingerprint = fingerprinter.fingerprint(path, size).unwrap();
//! println!("{fingerprint}");
//! ```

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use serde::{Serialize, Serializer};

use super::HashError;

/// Files larger than this are fingerprinted in chunks (512 MiB).
pub const LARGE_FILE_THRESHOLD: u64 = 512 * 1024 * 1024;

/// Chunk size for the streaming strategy (8 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// A 256-bit BLAKE3 content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Width of a fingerprint in bytes.
    pub const LEN: usize = 32;

    /// Wrap raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Fingerprint an in-memory buffer.
    #[must_use]
    pub fn of_bytes(data: &[u8]) -> Self {
        Self::from(blake3::hash(data))
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering (64 characters).
    #[must_use]
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    /// Parse a 64-character hex string. Returns `None` if malformed.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        blake3::Hash::from_hex(hex).ok().map(Self::from)
    }
}

impl From<blake3::Hash> for Fingerprint {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// How a file of a given size will be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Read the whole file into memory and hash it in one call.
    WholeRead,
    /// Stream the file through the hasher one chunk at a time.
    Chunked,
}

/// Computes content fingerprints for files.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    large_file_threshold: u64,
    chunk_size: usize,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

impl Fingerprinter {
    /// Create a fingerprinter with the default threshold and chunk size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            large_file_threshold: LARGE_FILE_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Files strictly larger than `threshold` bytes use the chunked strategy.
    #[must_use]
    pub fn with_large_file_threshold(mut self, threshold: u64) -> Self {
        self.large_file_threshold = threshold;
        self
    }

    /// Set the chunk size for the streaming strategy (minimum 1 byte).
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// The configured large-file threshold.
    #[must_use]
    pub fn large_file_threshold(&self) -> u64 {
        self.large_file_threshold
    }

    /// The configured chunk size.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Strategy used for a file of `size` bytes.
    #[must_use]
    pub fn strategy_for(&self, size: u64) -> Strategy {
        if size > self.large_file_threshold {
            Strategy::Chunked
        } else {
            Strategy::WholeRead
        }
    }

    /// Fingerprint the file at `path`, whose size was `size` at discovery.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read, or if
    /// fewer than `size` bytes could be read.
    ///
    /// Only the first `size` bytes are hashed, so bytes appended after
    /// discovery do not change the digest recorded for that size.
    pub fn fingerprint(&self, path: &Path, size: u64) -> Result<Fingerprint, HashError> {
        match self.strategy_for(size) {
            Strategy::WholeRead => self.fingerprint_whole(path, size),
            Strategy::Chunked => {
                log::debug!(
                    "Fingerprinting large file ({} MB) in {} byte chunks: {}",
                    size / (1024 * 1024),
                    self.chunk_size,
                    path.display()
                );
                self.fingerprint_chunked(path, size)
            }
        }
    }

    /// Read the whole file and hash it in one call.
    ///
    /// # Errors
    ///
    /// See [`Fingerprinter::fingerprint`].
    pub fn fingerprint_whole(&self, path: &Path, size: u64) -> Result<Fingerprint, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut data = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
        file.take(size)
            .read_to_end(&mut data)
            .map_err(|e| HashError::from_io(path, e))?;
        check_length(path, size, data.len() as u64)?;
        Ok(Fingerprint::of_bytes(&data))
    }

    /// Stream the file through the hasher in fixed-size chunks.
    ///
    /// # Errors
    ///
    /// See [`Fingerprinter::fingerprint`].
    pub fn fingerprint_chunked(&self, path: &Path, size: u64) -> Result<Fingerprint, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut reader = file.take(size);
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; self.chunk_size];
        let mut total: u64 = 0;

        loop {
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buffer[..n]);
            total += n as u64;
        }

        check_length(path, size, total)?;
        Ok(Fingerprint::from(hasher.finalize()))
    }
}

fn check_length(path: &Path, expected: u64, actual: u64) -> Result<(), HashError> {
    if actual < expected {
        return Err(HashError::Truncated {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(())
}
