//! Command-line interface definitions for dupescan.
//!
//! This module defines all CLI arguments using the clap derive API. Every
//! scan option is optional here so that unset flags fall through to the
//! config file, the environment, and finally the built-in defaults.
//!
//! # Example
//!
//! ```bash
//! # Scan a directory with the default limit of 10 concurrent files
//! dupescan -p ~/Downloads
//!
//! # Skip files under 64 KiB, keep the index on disk, write a copy of the report
//! dupescan -p /data --skip 64 --spill file -o report.txt
//!
//! # Abort on the first unreadable file
//! dupescan -p /data -i false
//!
//! # Verbose mode for debugging
//! dupescan -v -p ~/Downloads
//! ```

use std::path::PathBuf;

use clap::builder::{OsStringValueParser, TypedValueParser};
use clap::{ArgAction, Parser};

use crate::config::Config;
use crate::duplicates::SpillMode;
use crate::output::OutputFormat;

/// Find probable duplicate files by content fingerprint.
///
/// dupescan walks a directory tree, fingerprints every regular file with
/// BLAKE3 under a concurrency limit, and reports files that share a
/// fingerprint.
#[derive(Debug, Parser)]
#[command(name = "dupescan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Directory to scan
    #[arg(
        short,
        long,
        value_name = "PATH",
        value_parser = OsStringValueParser::new().map(PathBuf::from)
    )]
    pub path: Option<PathBuf>,

    /// Maximum files fingerprinted at once (default: 10)
    #[arg(short = 'm', long, value_name = "N", allow_negative_numbers = true)]
    pub max_concurrent: Option<i64>,

    /// Skip files smaller than this many KiB (default: 0)
    #[arg(long, value_name = "KB")]
    pub skip: Option<u64>,

    /// Skip unreadable files and directories instead of aborting (default: true)
    #[arg(short = 'i', long, value_name = "BOOL", action = ArgAction::Set)]
    pub ignore_errors: Option<bool>,

    /// Also write the report to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Where fingerprints are kept during the scan (default: memory)
    #[arg(long, value_enum, value_name = "MODE")]
    pub spill: Option<SpillMode>,

    /// Directory for the spill file (default: system temp dir)
    #[arg(long, value_name = "DIR")]
    pub spill_dir: Option<PathBuf>,

    /// Keep the spill file when the scan aborts
    #[arg(long)]
    pub keep_spill_on_error: bool,

    /// Files above this size are read in chunks (e.g., 512MiB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub large_file_threshold: Option<u64>,

    /// Chunk size for large files (e.g., 8KiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub chunk_size: Option<u64>,

    /// Report format (default: text)
    #[arg(long, value_enum, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Load settings from this TOML file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Report fatal errors as JSON on stderr
    #[arg(long)]
    pub json_errors: bool,
}

impl Cli {
    /// Overlay the flags that were given on top of `config`.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(limit) = self.max_concurrent {
            config.max_concurrent = limit;
        }
        if let Some(skip) = self.skip {
            config.skip_kb = skip;
        }
        if let Some(ignore) = self.ignore_errors {
            config.ignore_errors = ignore;
        }
        if let Some(mode) = self.spill {
            config.spill = mode;
        }
        if let Some(ref dir) = self.spill_dir {
            config.spill_dir = Some(dir.clone());
        }
        if self.keep_spill_on_error {
            config.keep_spill_on_error = true;
        }
        if let Some(threshold) = self.large_file_threshold {
            config.large_file_threshold = threshold;
        }
        if let Some(chunk) = self.chunk_size {
            config.chunk_size = usize::try_from(chunk).unwrap_or(usize::MAX);
        }
        if let Some(format) = self.format {
            config.format = format;
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports the following formats:
/// - Plain numbers: "1024" (bytes)
/// - Decimal units: "1KB", "1MB", "1GB", "1TB" (powers of 1000)
/// - Binary units: "1KiB", "1MiB", "1GiB", "1TiB" (powers of 1024)
///
/// Units are case-insensitive.
///
/// # Errors
///
/// Returns an error message for empty, negative or unparseable input.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
