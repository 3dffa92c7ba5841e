//! Duplicate finder: orchestrates one fingerprinting run.
//!
//! # Overview
//!
//! A run wires four pieces together:
//! 1. **Walker** on the calling thread discovers regular files in
//!    file-name order.
//! 2. **Admission gate** caps concurrent fingerprint work; the walker blocks
//!    on it when the cap is reached.
//! 3. **Workers** on a bounded rayon pool fingerprint one file each and
//!    publish the result on a bounded channel.
//! 4. **Collector** on its own thread fans results into the index (or the
//!    spill file) and decides whether an error aborts the run.
//!
//! Workers are spawned inside a rayon scope, so the scope exit is the point
//! where every worker has finished. Only then is the last sender dropped and
//! the collector allowed to see the end of the stream.
//!
//! # Example
//!
//! ```no_run
//! use dupescan::duplicates::{DuplicateFinder, FinderConfig};
//! use std::path::Path;
//!
//! let config = FinderConfig::default().with_max_concurrent(4);
//! let finder = DuplicateFinder::new(config);
//!
//! let (groups, summary) = finder.find_duplicates(Path::new("/some/path")).unwrap();
//!
//! println!("Found {} duplicate groups", summary.duplicate_groups);
//! println!("Reclaimable space: {}", summary.reclaimable_display());
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Sender};
use serde::Serialize;

use super::collector::{CollectOutcome, CollectStats, Collector, SpillMode};
use super::groups::DuplicateGroup;
use super::spill::SpillError;
use crate::config::ConfigError;
use crate::progress::{ProgressCallback, PHASE_FINGERPRINT};
use crate::scanner::{
    AdmissionGate, FileTask, FingerprintResult, Fingerprinter, GatePermit, HashError, ScanError,
    WalkStats, Walker, WalkerConfig, DEFAULT_CHUNK_SIZE, LARGE_FILE_THRESHOLD,
};
use crate::signal::CancelToken;

/// Default number of concurrent fingerprint computations.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Result channel capacity when concurrency is unlimited.
const UNLIMITED_CHANNEL_CAPACITY: usize = 64;

/// Configuration for a duplicate scan.
///
/// Built once per run and shared by reference with the walker, the
/// fingerprinter and the collector.
#[derive(Clone)]
pub struct FinderConfig {
    /// Maximum concurrent fingerprint computations (0 = unlimited)
    pub max_concurrent: usize,
    /// Files smaller than this many bytes are skipped (0 = no filter)
    pub min_size: u64,
    /// Skip path-level errors instead of aborting
    pub ignore_errors: bool,
    /// Where fingerprints are kept during the run
    pub spill: SpillMode,
    /// Directory for the spill file (system temp dir when unset)
    pub spill_dir: Option<PathBuf>,
    /// Keep the spill file when the run aborts
    pub keep_spill_on_error: bool,
    /// Files larger than this are fingerprinted in chunks
    pub large_file_threshold: u64,
    /// Chunk size for the streaming strategy
    pub chunk_size: usize,
    /// Optional shutdown flag for graceful termination
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("max_concurrent", &self.max_concurrent)
            .field("min_size", &self.min_size)
            .field("ignore_errors", &self.ignore_errors)
            .field("spill", &self.spill)
            .field("spill_dir", &self.spill_dir)
            .field("keep_spill_on_error", &self.keep_spill_on_error)
            .field("large_file_threshold", &self.large_file_threshold)
            .field("chunk_size", &self.chunk_size)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            min_size: 0,
            ignore_errors: true,
            spill: SpillMode::Memory,
            spill_dir: None,
            keep_spill_on_error: false,
            large_file_threshold: LARGE_FILE_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Set the concurrency limit (0 = unlimited).
    #[must_use]
    pub fn with_max_concurrent(mut self, limit: usize) -> Self {
        self.max_concurrent = limit;
        self
    }

    /// Set the minimum file size in bytes.
    #[must_use]
    pub fn with_min_size(mut self, bytes: u64) -> Self {
        self.min_size = bytes;
        self
    }

    /// Set whether path-level errors are skipped.
    #[must_use]
    pub fn with_ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = ignore;
        self
    }

    /// Set the spill mode.
    #[must_use]
    pub fn with_spill(mut self, mode: SpillMode) -> Self {
        self.spill = mode;
        self
    }

    /// Set the spill directory.
    #[must_use]
    pub fn with_spill_dir(mut self, dir: PathBuf) -> Self {
        self.spill_dir = Some(dir);
        self
    }

    /// Keep the spill file when the run aborts.
    #[must_use]
    pub fn with_keep_spill_on_error(mut self, keep: bool) -> Self {
        self.keep_spill_on_error = keep;
        self
    }

    /// Set the large-file threshold.
    #[must_use]
    pub fn with_large_file_threshold(mut self, bytes: u64) -> Self {
        self.large_file_threshold = bytes;
        self
    }

    /// Set the streaming chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Check values that would make a run meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidChunkSize`] for a zero chunk size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        Ok(())
    }

    /// Check if shutdown has been requested.
    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn walker_config(&self) -> WalkerConfig {
        WalkerConfig::new(self.min_size, self.ignore_errors)
    }

    fn fingerprinter(&self) -> Fingerprinter {
        Fingerprinter::new()
            .with_large_file_threshold(self.large_file_threshold)
            .with_chunk_size(self.chunk_size)
    }
}

/// Summary statistics from a duplicate scan.
#[derive(Debug, Default, Serialize)]
pub struct ScanSummary {
    /// Files fingerprinted successfully
    pub total_files: usize,
    /// Total size of fingerprinted files in bytes
    pub total_size: u64,
    /// Files whose fingerprint failed and were skipped
    pub failed_files: usize,
    /// Files skipped by the size filter
    pub skipped_small: u64,
    /// Traversal errors skipped by the walker
    pub walk_errors: u64,
    /// Number of duplicate groups
    pub duplicate_groups: usize,
    /// Number of files that belong to a duplicate group
    pub duplicate_files: usize,
    /// Space freed by keeping one copy per group
    pub reclaimable_space: u64,
    /// Wall-clock duration of the run
    #[serde(serialize_with = "serialize_duration_secs")]
    pub scan_duration: Duration,
    /// Highest number of concurrent fingerprint computations observed
    pub peak_in_flight: usize,
    /// Whether the index went through a spill file
    pub spilled: bool,
    /// Per-file errors that were skipped
    #[serde(skip)]
    pub errors: Vec<HashError>,
}

fn serialize_duration_secs<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl ScanSummary {
    /// Percentage of the scanned bytes that duplicates waste.
    #[must_use]
    pub fn wasted_percentage(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            (self.reclaimable_space as f64 / self.total_size as f64) * 100.0
        }
    }

    /// Format reclaimable space as human-readable string.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        format_size(self.reclaimable_space)
    }

    /// Format total size as human-readable string.
    #[must_use]
    pub fn total_size_display(&self) -> String {
        format_size(self.total_size)
    }

    fn from_run(
        groups: &[DuplicateGroup],
        walk: WalkStats,
        stats: CollectStats,
        peak_in_flight: usize,
        scan_duration: Duration,
    ) -> Self {
        Self {
            total_files: stats.recorded,
            total_size: stats.bytes,
            failed_files: stats.errors.len(),
            skipped_small: walk.skipped_small,
            walk_errors: walk.tolerated_errors,
            duplicate_groups: groups.len(),
            duplicate_files: groups.iter().map(DuplicateGroup::len).sum(),
            reclaimable_space: groups.iter().map(DuplicateGroup::wasted_space).sum(),
            scan_duration,
            peak_in_flight,
            spilled: stats.spilled,
            errors: stats.errors,
        }
    }
}

/// Format a byte size as a human-readable string.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    bytesize::ByteSize::b(bytes).to_string()
}

/// Errors that end a run.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The scan was interrupted by user (Ctrl+C or shutdown signal).
    #[error("Scan interrupted by user")]
    Interrupted,

    /// The configuration was rejected before scanning started.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// Traversal failed.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Fingerprinting a file failed and the error was not tolerated.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// The spill file could not be written or read back.
    #[error(transparent)]
    Spill(#[from] SpillError),

    /// The worker pool could not be built.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// An I/O error outside of per-file work.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The collector thread panicked.
    #[error("Result collector panicked")]
    CollectorPanicked,
}

/// Duplicate finder that runs the fingerprinting pipeline.
///
/// # Example
///
/// ```no_run
/// use dupescan::duplicates::DuplicateFinder;
/// use std::path::Path;
///
/// let finder = DuplicateFinder::with_defaults();
/// match finder.find_duplicates(Path::new(".")) {
///     Ok((groups, summary)) => {
///         println!("Found {} duplicate groups", groups.len());
///         println!("Can reclaim {} bytes", summary.reclaimable_space);
///     }
///     Err(e) => eprintln!("Scan failed: {}", e),
/// }
/// ```
#[derive(Debug)]
pub struct DuplicateFinder {
    config: FinderConfig,
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        Self { config }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// The configuration this finder runs with.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Find all duplicate files under `path`.
    ///
    /// Returns duplicate groups (sorted by fingerprint, paths sorted within
    /// each group) and summary statistics.
    ///
    /// # Errors
    ///
    /// Returns `FinderError` if:
    /// - The configuration is invalid or the path is empty
    /// - The path does not exist or is not a directory
    /// - A traversal or fingerprint error occurs and errors are not ignored
    /// - The spill file fails
    /// - The scan is interrupted by shutdown signal
    pub fn find_duplicates(
        &self,
        path: &Path,
    ) -> Result<(Vec<DuplicateGroup>, ScanSummary), FinderError> {
        let start_time = Instant::now();

        self.config.validate()?;
        validate_root(path)?;

        if self.config.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }

        log::info!(
            "Starting duplicate scan of {} (max {} concurrent, spill: {})",
            path.display(),
            self.config.max_concurrent,
            self.config.spill
        );

        let cancel = CancelToken::new();
        let _guard = cancel.guard();
        let limit = self.config.max_concurrent;
        let gate = AdmissionGate::new(limit);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(limit)
            .thread_name(|i| format!("dupescan-worker-{i}"))
            .build()?;

        let capacity = if limit == 0 {
            UNLIMITED_CHANNEL_CAPACITY
        } else {
            limit
        };
        let (tx, rx) = bounded::<FingerprintResult>(capacity);

        let collector = Collector::new(&self.config, cancel.clone())?;
        let collector_handle = std::thread::Builder::new()
            .name("dupescan-collector".into())
            .spawn(move || collector.run(rx))?;

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(PHASE_FINGERPRINT, 0);
        }

        let mut walker = Walker::new(path, self.config.walker_config())
            .with_cancel_token(cancel.clone());
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(flag.clone());
        }
        let fingerprinter = self.config.fingerprinter();
        let fingerprinter = &fingerprinter;

        let walk_result = pool.in_place_scope(|scope| {
            walker.walk(|task| {
                let permit = gate.acquire();
                let tx = tx.clone();
                let cancel = cancel.clone();
                scope.spawn(move |_| run_worker(task, fingerprinter, &tx, &cancel, permit));
            })
        });
        // The collector must see the abort before the stream closes.
        if walk_result.is_err() || self.config.is_shutdown_requested() {
            cancel.cancel();
        }
        // Every worker has returned; this is the last sender.
        drop(tx);

        let collected = collector_handle
            .join()
            .map_err(|_| FinderError::CollectorPanicked)?;

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(PHASE_FINGERPRINT);
        }

        let collected = collected?;
        let walk = match walk_result {
            Ok(stats) => stats,
            Err(ScanError::Cancelled) if self.config.is_shutdown_requested() => {
                return Err(FinderError::Interrupted);
            }
            Err(e) => return Err(e.into()),
        };
        if self.config.is_shutdown_requested() {
            return Err(FinderError::Interrupted);
        }
        let Some(CollectOutcome { index, stats }) = collected else {
            return Err(ScanError::Cancelled.into());
        };

        let groups = index.into_groups();
        let summary =
            ScanSummary::from_run(&groups, walk, stats, gate.peak(), start_time.elapsed());

        log::info!(
            "Scan complete: {} files, {} duplicate groups, {} reclaimable in {:.2?}",
            summary.total_files,
            summary.duplicate_groups,
            summary.reclaimable_display(),
            summary.scan_duration
        );

        Ok((groups, summary))
    }
}

/// Reject roots that cannot be walked.
fn validate_root(path: &Path) -> Result<(), FinderError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::EmptyPath.into());
    }
    if !path.exists() {
        return Err(ScanError::NotFound(path.to_path_buf()).into());
    }
    if !path.is_dir() {
        return Err(ScanError::NotADirectory(path.to_path_buf()).into());
    }
    Ok(())
}

/// Fingerprint one file and publish the outcome.
///
/// The permit is held until the result has been handed to the collector
/// (or dropped because the run was cancelled).
fn run_worker(
    task: FileTask,
    fingerprinter: &Fingerprinter,
    tx: &Sender<FingerprintResult>,
    cancel: &CancelToken,
    permit: GatePermit,
) {
    if cancel.is_cancelled() {
        log::trace!("Cancelled before start: {}", task.path.display());
        return;
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        fingerprinter.fingerprint(&task.path, task.size)
    }))
    .unwrap_or_else(|payload| {
        Err(HashError::WorkerPanicked {
            path: task.path.clone(),
            message: panic_message(payload.as_ref()),
        })
    });

    let result = FingerprintResult::new(task, outcome);
    select! {
        send(tx, result) -> sent => {
            if sent.is_err() {
                log::trace!("Collector gone, dropping result");
            }
        }
        recv(cancel.done()) -> _ => {
            log::trace!("Cancelled while publishing, dropping result");
        }
    }

    permit.release();
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
