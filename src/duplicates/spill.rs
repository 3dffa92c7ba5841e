//! Disk-backed spill file for large scans.
//!
//! In spill mode the collector appends one record per fingerprinted file
//! instead of growing an in-memory index. Once every worker has checked in,
//! the file is flushed, closed for writing, and read back sequentially to
//! rebuild a [`FingerprintIndex`].
//!
//! # Record format
//!
//! ```text
//! <escaped path>||<64 hex chars>||<decimal size>\n
//! ```
//!
//! Records are parsed from the right, since neither the fingerprint nor the
//! size can contain `|`; a path may therefore contain the delimiter. In the
//! path field `\` is written as `\\`, newline as `\n` and carriage return as
//! `\r`. The file is a private, run-scoped artifact: it lives in a
//! [`tempfile`] and is removed when dropped, unless explicitly kept for
//! diagnostics.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempPath};

use super::index::FingerprintIndex;
use crate::scanner::Fingerprint;

const DELIMITER: &[u8] = b"||";
const FILE_PREFIX: &str = "dupescan-spill-";

/// Errors reading or writing the spill file. Always fatal to the run.
#[derive(thiserror::Error, Debug)]
pub enum SpillError {
    /// The spill file could not be created.
    #[error("Failed to create spill file in {dir}: {source}")]
    Create {
        /// Directory the file was to be created in
        dir: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Appending or flushing failed.
    #[error("Failed to write spill file {path}: {source}")]
    Write {
        /// Spill file path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Reading the file back failed.
    #[error("Failed to read spill file {path}: {source}")]
    Read {
        /// Spill file path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A record could not be parsed.
    #[error("Malformed spill record at line {line}: {reason}")]
    Malformed {
        /// 1-based line number
        line: u64,
        /// What was wrong with it
        reason: String,
    },
}

/// Append-only writer for spill records.
#[derive(Debug)]
pub struct SpillWriter {
    writer: BufWriter<NamedTempFile>,
    path: PathBuf,
    records: u64,
}

impl SpillWriter {
    /// Create a new spill file inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`SpillError::Create`] if the file cannot be created.
    pub fn create_in(dir: &Path) -> Result<Self, SpillError> {
        let file = tempfile::Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(".txt")
            .tempfile_in(dir)
            .map_err(|source| SpillError::Create {
                dir: dir.to_path_buf(),
                source,
            })?;
        let path = file.path().to_path_buf();
        log::debug!("Spilling fingerprints to {}", path.display());

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            records: 0,
        })
    }

    /// Location of the spill file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records appended so far.
    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Append one record.
    ///
    /// # Errors
    ///
    /// Returns [`SpillError::Write`] on I/O failure.
    pub fn append(
        &mut self,
        path: &Path,
        fingerprint: &Fingerprint,
        size: u64,
    ) -> Result<(), SpillError> {
        let record = encode_record(path, fingerprint, size);
        self.writer
            .write_all(&record)
            .map_err(|source| SpillError::Write {
                path: self.path.clone(),
                source,
            })?;
        self.records += 1;
        Ok(())
    }

    fn flush_into_inner(self) -> Result<NamedTempFile, SpillError> {
        let path = self.path;
        self.writer
            .into_inner()
            .map_err(|e| SpillError::Write {
                path,
                source: e.into_error(),
            })
    }

    /// Flush and close the file for writing, ready to be read back.
    ///
    /// # Errors
    ///
    /// Returns [`SpillError::Write`] if buffered records cannot be flushed.
    pub fn finish(self) -> Result<SpillReader, SpillError> {
        let records = self.records;
        let file = self.flush_into_inner()?;
        Ok(SpillReader {
            path: file.into_temp_path(),
            records,
        })
    }

    /// Flush and keep the file on disk past the end of the run.
    ///
    /// # Errors
    ///
    /// Returns [`SpillError::Write`] if the file cannot be flushed or kept.
    pub fn keep(self) -> Result<PathBuf, SpillError> {
        let path = self.path.clone();
        let file = self.flush_into_inner()?;
        file.keep()
            .map(|(_, kept)| kept)
            .map_err(|e| SpillError::Write {
                path,
                source: e.error,
            })
    }
}

/// A flushed spill file, removed when dropped.
#[derive(Debug)]
pub struct SpillReader {
    path: TempPath,
    records: u64,
}

impl SpillReader {
    /// Location of the spill file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record once, sequentially, into a fresh index.
    ///
    /// The file is deleted when this returns.
    ///
    /// # Errors
    ///
    /// Returns [`SpillError::Read`] on I/O failure or
    /// [`SpillError::Malformed`] if a record does not parse.
    pub fn rebuild_index(self) -> Result<FingerprintIndex, SpillError> {
        let read_error = |source| SpillError::Read {
            path: self.path.to_path_buf(),
            source,
        };

        let file = File::open(&self.path).map_err(read_error)?;
        let mut index = FingerprintIndex::new();

        for (i, line) in BufReader::new(file).split(b'\n').enumerate() {
            let line = line.map_err(read_error)?;
            let (path, fingerprint, size) = parse_record(&line, i as u64 + 1)?;
            index.insert(fingerprint, path, size);
        }

        if index.len() as u64 != self.records {
            log::warn!(
                "Spill file {} held {} records, expected {}",
                self.path.display(),
                index.len(),
                self.records
            );
        }
        log::debug!("Rebuilt index from {} spill records", index.len());
        Ok(index)
    }
}

/// Serialize one record, including the trailing newline.
#[must_use]
pub fn encode_record(path: &Path, fingerprint: &Fingerprint, size: u64) -> Vec<u8> {
    let raw = path_bytes(path);
    let mut out = Vec::with_capacity(raw.len() + 80);
    for &b in raw.iter() {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(b),
        }
    }
    out.extend_from_slice(DELIMITER);
    out.extend_from_slice(fingerprint.to_hex().as_bytes());
    out.extend_from_slice(DELIMITER);
    out.extend_from_slice(size.to_string().as_bytes());
    out.push(b'\n');
    out
}

/// Parse one record (without its trailing newline).
///
/// # Errors
///
/// Returns [`SpillError::Malformed`] naming `line` if the record is invalid.
pub fn parse_record(record: &[u8], line: u64) -> Result<(PathBuf, Fingerprint, u64), SpillError> {
    let malformed = |reason: &str| SpillError::Malformed {
        line,
        reason: reason.to_string(),
    };

    let (rest, size) = rsplit_field(record).ok_or_else(|| malformed("missing size field"))?;
    let (escaped, hex) = rsplit_field(rest).ok_or_else(|| malformed("missing fingerprint field"))?;

    let size = std::str::from_utf8(size)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| malformed("size is not a base-10 integer"))?;
    let fingerprint = std::str::from_utf8(hex)
        .ok()
        .and_then(Fingerprint::from_hex)
        .ok_or_else(|| malformed("fingerprint is not 64 hex characters"))?;
    let path = unescape(escaped).ok_or_else(|| malformed("invalid escape in path"))?;

    let path = bytes_to_path(path).ok_or_else(|| malformed("path is not valid UTF-8"))?;
    Ok((path, fingerprint, size))
}

/// Split at the last delimiter.
fn rsplit_field(record: &[u8]) -> Option<(&[u8], &[u8])> {
    let at = record
        .windows(DELIMITER.len())
        .rposition(|w| w == DELIMITER)?;
    Some((&record[..at], &record[at + DELIMITER.len()..]))
}

fn unescape(escaped: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(escaped.len());
    let mut bytes = escaped.iter();
    while let Some(&b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.next()? {
            b'\\' => out.push(b'\\'),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            _ => return None,
        }
    }
    Some(out)
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> std::borrow::Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    std::borrow::Cow::Borrowed(path.as_os_str().as_bytes())
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> std::borrow::Cow<'_, [u8]> {
    match path.to_string_lossy() {
        std::borrow::Cow::Borrowed(s) => std::borrow::Cow::Borrowed(s.as_bytes()),
        std::borrow::Cow::Owned(s) => std::borrow::Cow::Owned(s.into_bytes()),
    }
}

#[cfg(unix)]
fn bytes_to_path(bytes: Vec<u8>) -> Option<PathBuf> {
    use std::os::unix::ffi::OsStringExt;
    Some(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
fn bytes_to_path(bytes: Vec<u8>) -> Option<PathBuf> {
    String::from_utf8(bytes).ok().map(PathBuf::from)
}
