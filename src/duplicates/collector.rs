//! Result collector: the single fan-in point of the pipeline.
//!
//! # Overview
//!
//! The [`Collector`] runs on its own thread and drains the result channel
//! until every sender has been dropped. Each successful result is recorded
//! either in an in-memory [`FingerprintIndex`] or appended to a spill file.
//! Failed results are checked against the ignore-errors policy: tolerated
//! path errors are logged and counted, anything else raises cancellation
//! and ends collection with the original error.
//!
//! The final pass (re-reading the spill file) only happens when the stream
//! closed without cancellation. A cancelled run skips it and disposes of the
//! spill file the same way a fatal error does.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use super::finder::{FinderConfig, FinderError};
use super::index::FingerprintIndex;
use super::spill::SpillWriter;
use crate::progress::ProgressCallback;
use crate::scanner::{FingerprintResult, HashError};
use crate::signal::CancelToken;

/// Where the collector keeps fingerprints while the scan runs.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SpillMode {
    /// Keep the index in memory
    #[default]
    Memory,
    /// Append records to a temporary file, re-read once at the end
    File,
}

impl std::fmt::Display for SpillMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpillMode::Memory => write!(f, "memory"),
            SpillMode::File => write!(f, "file"),
        }
    }
}

/// Counters and tolerated errors from one collection run.
#[derive(Debug, Default)]
pub struct CollectStats {
    /// Results received from workers
    pub received: usize,
    /// Fingerprints recorded
    pub recorded: usize,
    /// Bytes covered by recorded fingerprints
    pub bytes: u64,
    /// Path errors skipped under the ignore-errors policy
    pub errors: Vec<HashError>,
    /// Whether records went through a spill file
    pub spilled: bool,
}

/// What the collector hands back once the stream closes cleanly.
#[derive(Debug)]
pub struct CollectOutcome {
    /// Every recorded fingerprint
    pub index: FingerprintIndex,
    /// Collection counters
    pub stats: CollectStats,
}

#[derive(Debug)]
enum Sink {
    Memory(FingerprintIndex),
    Spill(SpillWriter),
}

/// Consumes [`FingerprintResult`]s from workers.
pub struct Collector {
    sink: Sink,
    ignore_errors: bool,
    keep_spill_on_error: bool,
    cancel: CancelToken,
    progress: Option<Arc<dyn ProgressCallback>>,
    stats: CollectStats,
}

impl Collector {
    /// Create a collector for one run.
    ///
    /// In spill mode the spill file is created here, in `spill_dir` or the
    /// system temp directory.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::Spill`] if the spill file cannot be created.
    pub fn new(config: &FinderConfig, cancel: CancelToken) -> Result<Self, FinderError> {
        let sink = match config.spill {
            SpillMode::Memory => Sink::Memory(FingerprintIndex::new()),
            SpillMode::File => {
                let dir = config
                    .spill_dir
                    .clone()
                    .unwrap_or_else(std::env::temp_dir);
                Sink::Spill(SpillWriter::create_in(&dir)?)
            }
        };

        Ok(Self {
            stats: CollectStats {
                spilled: matches!(sink, Sink::Spill(_)),
                ..Default::default()
            },
            sink,
            ignore_errors: config.ignore_errors,
            keep_spill_on_error: config.keep_spill_on_error,
            cancel,
            progress: config.progress_callback.clone(),
        })
    }

    /// Drain `results` until every sender is gone, then build the index.
    ///
    /// Returns `Ok(None)` when the token was raised by someone else before
    /// the stream closed; the caller owns the reason for that abort.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error. Cancellation has been raised by the
    /// time this returns an error.
    pub fn run(
        mut self,
        results: Receiver<FingerprintResult>,
    ) -> Result<Option<CollectOutcome>, FinderError> {
        for result in results.iter() {
            if let Err(e) = self.accept(result) {
                self.cancel.cancel();
                self.abandon();
                return Err(e);
            }
        }

        if self.cancel.is_cancelled() {
            log::debug!(
                "Collector: run cancelled after {} results, skipping final pass",
                self.stats.received
            );
            self.abandon();
            return Ok(None);
        }

        self.finish().map(Some)
    }

    /// Handle one result.
    fn accept(&mut self, result: FingerprintResult) -> Result<(), FinderError> {
        self.stats.received += 1;
        if let Some(ref callback) = self.progress {
            callback.on_progress(self.stats.received, result.path.to_string_lossy().as_ref());
        }

        let fingerprint = match result.outcome {
            Ok(fingerprint) => fingerprint,
            Err(e) if self.ignore_errors && e.is_path_error() => {
                log::warn!("Skipping {}: {}", e.path().display(), e);
                self.stats.errors.push(e);
                return Ok(());
            }
            Err(e) => {
                log::error!("Fatal error fingerprinting {}: {}", e.path().display(), e);
                return Err(FinderError::Hash(e));
            }
        };

        log::trace!("Fingerprinted {} ({})", result.path.display(), fingerprint);
        match &mut self.sink {
            Sink::Memory(index) => index.insert(fingerprint, result.path, result.size),
            Sink::Spill(writer) => writer.append(&result.path, &fingerprint, result.size)?,
        }

        self.stats.recorded += 1;
        self.stats.bytes += result.size;
        if let Some(ref callback) = self.progress {
            callback.on_item_completed(result.size);
        }
        Ok(())
    }

    /// Final pass after the stream closed cleanly.
    fn finish(self) -> Result<CollectOutcome, FinderError> {
        let index = match self.sink {
            Sink::Memory(index) => index,
            Sink::Spill(writer) => {
                log::debug!(
                    "Re-reading {} spill records from {}",
                    writer.records(),
                    writer.path().display()
                );
                writer.finish()?.rebuild_index()?
            }
        };

        log::debug!(
            "Collector finished: {} received, {} recorded, {} skipped",
            self.stats.received,
            self.stats.recorded,
            self.stats.errors.len()
        );
        Ok(CollectOutcome {
            index,
            stats: self.stats,
        })
    }

    /// Dispose of the sink after a fatal error.
    fn abandon(self) {
        if let Sink::Spill(writer) = self.sink {
            if self.keep_spill_on_error {
                match writer.keep() {
                    Ok(path) => log::info!("Spill file kept for diagnostics: {}", path.display()),
                    Err(e) => log::warn!("Could not keep spill file: {}", e),
                }
            }
        }
    }
}
