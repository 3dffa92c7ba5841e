//! Duplicate groups derived from the fingerprint index.
//!
//! # Example
//!
//! ```
//! use dupescan::duplicates::FingerprintIndex;
//! use dupescan::scanner::Fingerprint;
//! use std::path::PathBuf;
//!
//! let mut index = FingerprintIndex::new();
//! let hello = Fingerprint::of_bytes(b"hello");
//! index.insert(hello, PathBuf::from("/a.txt"), 5);
//! index.insert(hello, PathBuf::from("/b.txt"), 5);
//! index.insert(Fingerprint::of_bytes(b"world"), PathBuf::from("/c.txt"), 5);
//!
//! let groups = index.into_groups();
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].len(), 2);
//! assert_eq!(groups[0].wasted_space(), 5);
//! ```

use serde::Serialize;

use super::index::IndexedPath;
use crate::scanner::Fingerprint;

/// A fingerprint shared by two or more files.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateGroup {
    /// BLAKE3 fingerprint of the content
    pub fingerprint: Fingerprint,
    /// File size in bytes
    pub size: u64,
    /// Files sharing the fingerprint
    pub files: Vec<IndexedPath>,
}

impl DuplicateGroup {
    /// Create a new duplicate group.
    #[must_use]
    pub fn new(fingerprint: Fingerprint, size: u64, files: Vec<IndexedPath>) -> Self {
        Self {
            fingerprint,
            size,
            files,
        }
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of redundant copies (all files minus one).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    /// Total size of all files in this group.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.size * self.files.len() as u64
    }

    /// Space that removing all but one copy would free.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.duplicate_count() as u64
    }

    /// Fingerprint as a hex string.
    #[must_use]
    pub fn fingerprint_hex(&self) -> String {
        self.fingerprint.to_hex()
    }
}
