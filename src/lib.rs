//! dupescan - bounded-concurrency duplicate file scanner
//!
//! Walks a directory tree, fingerprints every regular file with BLAKE3 under a
//! concurrency limit, and reports groups of files that share a fingerprint.
//! Results can be held in memory or spilled to a temporary file for very
//! large trees.

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::Context;

use crate::cli::Cli;
use crate::config::{Config, ConfigError};
use crate::duplicates::DuplicateFinder;
use crate::error::ExitCode;
use crate::output::{OutputFormat, TeeWriter};
use crate::progress::Progress;

/// Run the application with parsed arguments.
///
/// Returns [`ExitCode::Success`] when duplicates were found and
/// [`ExitCode::NoDuplicates`] otherwise.
///
/// # Errors
///
/// Returns an error for invalid configuration, an unwritable output file,
/// a fatal scan error, or an interrupted scan.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_to(&mut config);
    match toml::to_string_pretty(&config) {
        Ok(effective) => log::debug!("Effective configuration:\n{}", effective.trim_end()),
        Err(e) => log::debug!("Could not render configuration: {}", e),
    }

    let root = cli.path.clone().unwrap_or_default();
    if root.as_os_str().is_empty() {
        return Err(ConfigError::EmptyPath.into());
    }

    let format = config.format;
    let handler = signal::install_handler()?;
    let mut finder_config = config
        .into_finder_config()?
        .with_shutdown_flag(handler.get_flag());
    if format == OutputFormat::Text && !cli.quiet && io::stderr().is_terminal() {
        finder_config = finder_config.with_progress_callback(Arc::new(Progress::new(false)));
    }

    // The output file is created before scanning so a bad path fails fast.
    let mut writer = match cli.output {
        Some(ref path) => TeeWriter::with_file(io::stdout(), path)
            .with_context(|| format!("Failed to create output file {}", path.display()))?,
        None => TeeWriter::new(io::stdout()),
    };

    let finder = DuplicateFinder::new(finder_config);
    let (groups, summary) = finder.find_duplicates(&root)?;

    let exit_code = if groups.is_empty() {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    };

    output::write_report(&mut writer, format, &groups, &summary, exit_code)
        .context("Failed to write report")?;
    drop(writer);

    for error in &summary.errors {
        log::debug!("Skipped: {}", error);
    }
    if summary.failed_files > 0 || summary.walk_errors > 0 {
        log::warn!(
            "{} files and {} directories could not be read and were skipped",
            summary.failed_files,
            summary.walk_errors
        );
    }
    log::info!(
        "Scanned {} files ({}) in {:.2?}",
        summary.total_files,
        summary.total_size_display(),
        summary.scan_duration
    );
    if format == OutputFormat::Text {
        println!("{:.2?}", summary.scan_duration);
    }

    Ok(exit_code)
}
