//! Directory walker implementation using walkdir.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct, which traverses a directory
//! tree on the calling thread and hands every regular file that survives
//! filtering to a visitor as a [`FileTask`]. The visitor is where the
//! finder acquires an admission slot and launches a worker, so a saturated
//! gate throttles the walk itself.
//!
//! # Features
//!
//! - Children visited in file-name order, so discovery order is stable
//! - Symlinks, directories, and special files are skipped silently
//! - Minimum size filter
//! - Traversal errors either logged and skipped or propagated, per policy
//! - Cooperative cancellation, checked after every entry
//!
//! # Example
//!
//! ```no_run
//! use dupescan::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Downloads"), WalkerConfig::default());
//! let mut tasks = Vec::new();
//! let stats = walker.walk(|task| tasks.push(task)).unwrap();
//! assert_eq!(stats.files, tasks.len() as u64);
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::{DirEntry, WalkDir};

use super::{FileTask, ScanError, WalkerConfig};
use crate::signal::CancelToken;

/// Counters collected during one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Entries yielded by the traversal, excluding errors
    pub entries: u64,
    /// Regular files handed to the visitor
    pub files: u64,
    /// Regular files skipped by the minimum size filter
    pub skipped_small: u64,
    /// Traversal errors that were logged and skipped
    pub tolerated_errors: u64,
}

/// Sorted, single-threaded directory walker.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Run-scoped cancellation token
    cancel: Option<CancelToken>,
    /// Optional Ctrl+C flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            cancel: None,
            shutdown_flag: None,
        }
    }

    /// Stop the walk once `token` is raised.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Stop the walk once the Ctrl+C flag is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
            || self
                .shutdown_flag
                .as_ref()
                .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Check if a file passes the size filter.
    fn passes_size_filter(&self, size: u64) -> bool {
        self.config.min_size.is_none_or(|min| size >= min)
    }

    /// Walk the directory tree, calling `visit` for every regular file.
    ///
    /// `visit` may block; the walk does not advance until it returns.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Cancelled`] if cancellation was raised, or the
    /// first traversal error when errors are not being ignored.
    pub fn walk<F>(&self, mut visit: F) -> Result<WalkStats, ScanError>
    where
        F: FnMut(FileTask),
    {
        let mut stats = WalkStats::default();

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walk_dir {
            match entry {
                Ok(entry) => {
                    stats.entries += 1;
                    self.process_entry(entry, &mut stats, &mut visit)?;
                }
                Err(e) => self.handle_walk_error(e, &mut stats)?,
            }

            if self.is_cancelled() {
                log::debug!("Walker: cancellation raised, stopping traversal");
                return Err(ScanError::Cancelled);
            }
        }

        log::debug!(
            "Walk of {} complete: {} files, {} skipped by size, {} errors ignored",
            self.root.display(),
            stats.files,
            stats.skipped_small,
            stats.tolerated_errors
        );
        Ok(stats)
    }

    /// Collect every task instead of streaming them.
    ///
    /// # Errors
    ///
    /// See [`Walker::walk`].
    pub fn collect_tasks(&self) -> Result<Vec<FileTask>, ScanError> {
        let mut tasks = Vec::new();
        self.walk(|task| tasks.push(task))?;
        Ok(tasks)
    }

    fn process_entry<F>(
        &self,
        entry: DirEntry,
        stats: &mut WalkStats,
        visit: &mut F,
    ) -> Result<(), ScanError>
    where
        F: FnMut(FileTask),
    {
        // Symlinks report their own type since links are not followed
        if !entry.file_type().is_file() {
            return Ok(());
        }

        let size = match entry.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => return self.handle_walk_error(e, stats),
        };

        if !self.passes_size_filter(size) {
            log::trace!(
                "Skipping file due to size filter ({}): {}",
                size,
                entry.path().display()
            );
            stats.skipped_small += 1;
            return Ok(());
        }

        let task = FileTask::new(entry.into_path(), size, stats.files);
        stats.files += 1;
        visit(task);
        Ok(())
    }

    /// Log and skip a traversal error, or turn it into a [`ScanError`].
    fn handle_walk_error(
        &self,
        error: walkdir::Error,
        stats: &mut WalkStats,
    ) -> Result<(), ScanError> {
        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);

        if self.config.ignore_errors {
            log::warn!("Skipping {}: {}", path.display(), error);
            stats.tolerated_errors += 1;
            return Ok(());
        }

        log::error!("Walker error for {}: {}", path.display(), error);
        Err(ScanError::from_walk_error(path, error))
    }
}
