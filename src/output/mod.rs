//! Output formatters for duplicate scan results.
//!
//! This module provides the report formats:
//! - Plain text, the default, for reading in a terminal
//! - JSON for automation and scripting
//!
//! Reports go to stdout and, when `--output` is given, to a file as well
//! through [`TeeWriter`].
//!
//! # Example
//!
//! ```no_run
//! use dupescan::duplicates::DuplicateFinder;
//! use dupescan::output::text::TextOutput;
//! use std::path::Path;
//!
//! let finder = DuplicateFinder::with_defaults();
//! let (groups, _summary) = finder.find_duplicates(Path::new(".")).unwrap();
//!
//! print!("{}", TextOutput::new(&groups).render());
//! ```

pub mod json;
pub mod text;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::duplicates::{DuplicateGroup, ScanSummary};
use crate::error::ExitCode;

// Re-export main types
pub use json::{JsonOutput, JsonOutputError};
pub use text::TextOutput;

/// Report format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable group listing
    #[default]
    Text,
    /// Machine-readable JSON document
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Writer that duplicates everything into an optional second sink.
#[derive(Debug)]
pub struct TeeWriter<W: Write> {
    primary: W,
    copy: Option<BufWriter<File>>,
}

impl<W: Write> TeeWriter<W> {
    /// Write only to `primary`.
    pub fn new(primary: W) -> Self {
        Self {
            primary,
            copy: None,
        }
    }

    /// Write to `primary` and a freshly created file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn with_file(primary: W, path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            primary,
            copy: Some(BufWriter::new(file)),
        })
    }

    /// Whether a file copy is being written.
    #[must_use]
    pub fn has_copy(&self) -> bool {
        self.copy.is_some()
    }
}

impl<W: Write> Write for TeeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.primary.write_all(buf)?;
        if let Some(ref mut copy) = self.copy {
            copy.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.primary.flush()?;
        if let Some(ref mut copy) = self.copy {
            copy.flush()?;
        }
        Ok(())
    }
}

/// Write the report for one run in `format`.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_report<W: Write>(
    writer: &mut W,
    format: OutputFormat,
    groups: &[DuplicateGroup],
    summary: &ScanSummary,
    exit_code: ExitCode,
) -> Result<(), JsonOutputError> {
    match format {
        OutputFormat::Text => TextOutput::new(groups).write_to(writer)?,
        OutputFormat::Json => JsonOutput::new(groups, summary, exit_code).write_to(writer, true)?,
    }
    writer.flush()?;
    Ok(())
}
