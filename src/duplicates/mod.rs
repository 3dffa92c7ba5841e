//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Fanning worker results into a fingerprint index ([`collector`])
//! - Disk-backed spill storage for large scans ([`spill`])
//! - Orchestrating a complete run ([`finder`])
//! - Deriving duplicate groups ([`groups`])

pub mod collector;
pub mod finder;
pub mod groups;
pub mod index;
pub mod spill;

pub use collector::{CollectOutcome, CollectStats, Collector, SpillMode};
pub use finder::{
    format_size, DuplicateFinder, FinderConfig, FinderError, ScanSummary, DEFAULT_MAX_CONCURRENT,
};
pub use groups::DuplicateGroup;
pub use index::{FingerprintIndex, IndexedPath};
pub use spill::{SpillError, SpillReader, SpillWriter};
