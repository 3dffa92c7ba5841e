//! Fingerprint index built by the collector.
//!
//! Maps each fingerprint to the paths that produced it, in arrival order,
//! plus a side table of fingerprint → size. The side table is what the
//! spill path relies on when per-path results are no longer resident.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;

use super::groups::DuplicateGroup;
use crate::scanner::Fingerprint;

/// A path recorded under a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedPath {
    /// Path of the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

/// Fingerprint → paths mapping.
#[derive(Debug, Default)]
pub struct FingerprintIndex {
    entries: HashMap<Fingerprint, Vec<IndexedPath>>,
    sizes: HashMap<Fingerprint, u64>,
    paths: usize,
}

impl FingerprintIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `path` (of `size` bytes) has `fingerprint`.
    pub fn insert(&mut self, fingerprint: Fingerprint, path: PathBuf, size: u64) {
        self.entries
            .entry(fingerprint)
            .or_default()
            .push(IndexedPath { path, size });
        self.sizes.insert(fingerprint, size);
        self.paths += 1;
    }

    /// Total number of paths recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths
    }

    /// Whether no paths have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths == 0
    }

    /// Number of distinct fingerprints.
    #[must_use]
    pub fn fingerprint_count(&self) -> usize {
        self.entries.len()
    }

    /// Paths recorded under `fingerprint`, in arrival order.
    #[must_use]
    pub fn paths(&self, fingerprint: &Fingerprint) -> Option<&[IndexedPath]> {
        self.entries.get(fingerprint).map(Vec::as_slice)
    }

    /// Size recorded for `fingerprint`.
    #[must_use]
    pub fn size_of(&self, fingerprint: &Fingerprint) -> Option<u64> {
        self.sizes.get(fingerprint).copied()
    }

    /// Consume the index and return every fingerprint shared by 2+ paths.
    ///
    /// Groups are sorted by fingerprint and paths within a group by path,
    /// which matches the walker's discovery order.
    #[must_use]
    pub fn into_groups(self) -> Vec<DuplicateGroup> {
        let sizes = self.sizes;
        let mut groups: Vec<DuplicateGroup> = self
            .entries
            .into_iter()
            .filter(|(_, paths)| paths.len() > 1)
            .map(|(fingerprint, mut files)| {
                files.sort_by(|a, b| a.path.cmp(&b.path));
                let size = sizes
                    .get(&fingerprint)
                    .copied()
                    .unwrap_or_else(|| files.first().map_or(0, |f| f.size));
                DuplicateGroup::new(fingerprint, size, files)
            })
            .collect();

        groups.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        groups
    }
}
