//! Scanner module for directory traversal and file fingerprinting.
//!
//! This module provides functionality for:
//! - Sorted single-threaded directory walking using walkdir
//! - Content fingerprinting with BLAKE3 (whole-read or chunked)
//! - An admission gate that bounds concurrent fingerprint work
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`fingerprint`]: BLAKE3 file fingerprinting
//! - [`gate`]: Concurrency-limiting admission gate
//!
//! # Example
//!
//! ```no_run
//! use dupescan::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     min_size: Some(1024), // Skip files under 1KB
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("."), config);
//! let stats = walker
//!     .walk(|task| println!("{}: {} bytes", task.path.display(), task.size))
//!     .unwrap();
//! println!("{} files", stats.files);
//! ```

pub mod fingerprint;
pub mod gate;
pub mod walker;

use std::path::{Path, PathBuf};

// Re-export main types
pub use fingerprint::{
    Fingerprint, Fingerprinter, Strategy, DEFAULT_CHUNK_SIZE, LARGE_FILE_THRESHOLD,
};
pub use gate::{AdmissionGate, GatePermit};
pub use walker::{WalkStats, Walker};

/// A regular file discovered by the walker, waiting to be fingerprinted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    /// Path to the file (rooted at the scan root)
    pub path: PathBuf,
    /// File size in bytes at discovery time
    pub size: u64,
    /// Directory containing the file
    pub parent: PathBuf,
    /// Discovery order within the walk, starting at 0
    pub seq: u64,
}

impl FileTask {
    /// Create a new task; the parent directory is derived from `path`.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, seq: u64) -> Self {
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            path,
            size,
            parent,
            seq,
        }
    }
}

/// Outcome of fingerprinting one [`FileTask`].
///
/// Produced by a worker and handed to the collector exactly once.
#[derive(Debug)]
pub struct FingerprintResult {
    /// Path of the fingerprinted file
    pub path: PathBuf,
    /// File size recorded by the walker
    pub size: u64,
    /// Directory containing the file
    pub parent: PathBuf,
    /// The fingerprint, or why it could not be computed
    pub outcome: Result<Fingerprint, HashError>,
}

impl FingerprintResult {
    /// Wrap a worker outcome together with the task it belongs to.
    #[must_use]
    pub fn new(task: FileTask, outcome: Result<Fingerprint, HashError>) -> Self {
        Self {
            path: task.path,
            size: task.size,
            parent: task.parent,
            outcome,
        }
    }

    /// Whether the fingerprint was computed successfully.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Minimum file size to include (in bytes).
    /// Files smaller than this are skipped.
    pub min_size: Option<u64>,

    /// Log and skip traversal errors instead of aborting the walk.
    pub ignore_errors: bool,
}

impl WalkerConfig {
    /// Create a new walker configuration.
    ///
    /// A `min_size` of zero disables the size filter.
    #[must_use]
    pub fn new(min_size: u64, ignore_errors: bool) -> Self {
        Self {
            min_size: (min_size > 0).then_some(min_size),
            ignore_errors,
        }
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Traversal failed below the root.
    #[error("Walk error for {path}: {source}")]
    Walk {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying traversal error
        #[source]
        source: walkdir::Error,
    },

    /// The walk stopped because cancellation was raised.
    #[error("Walk cancelled")]
    Cancelled,
}

impl ScanError {
    /// Classify a walkdir error by its underlying I/O error kind.
    pub(crate) fn from_walk_error(path: PathBuf, error: walkdir::Error) -> Self {
        use std::io::ErrorKind;

        match error.io_error().map(std::io::Error::kind) {
            Some(ErrorKind::PermissionDenied) => Self::PermissionDenied(path),
            Some(ErrorKind::NotFound) => Self::NotFound(path),
            _ => Self::Walk {
                path,
                source: error,
            },
        }
    }
}

/// Errors that can occur while fingerprinting a single file.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The file vanished between discovery and open.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file shrank after it was discovered.
    #[error("File truncated while reading {path}: expected {expected} bytes, read {actual}")]
    Truncated {
        /// Path of the file
        path: PathBuf,
        /// Size recorded by the walker
        expected: u64,
        /// Bytes actually read
        actual: u64,
    },

    /// The worker panicked while fingerprinting.
    #[error("Worker panicked while fingerprinting {path}: {message}")]
    WorkerPanicked {
        /// Path being fingerprinted
        path: PathBuf,
        /// Panic payload, if it was a string
        message: String,
    },
}

impl HashError {
    /// Map an I/O error for `path` onto the matching variant.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Whether this is an expected, per-path failure that the
    /// ignore-errors policy may skip.
    #[must_use]
    pub fn is_path_error(&self) -> bool {
        !matches!(self, Self::WorkerPanicked { .. })
    }

    /// The path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(path) | Self::PermissionDenied(path) => path,
            Self::Io { path, .. }
            | Self::Truncated { path, .. }
            | Self::WorkerPanicked { path, .. } => path,
        }
    }
}
