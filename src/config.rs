//! Application configuration management.
//!
//! Settings are layered with figment, lowest precedence first:
//! 1. Built-in defaults
//! 2. TOML file (`--config <FILE>`, or `config.toml` in the platform config
//!    directory when present)
//! 3. `DUPESCAN_*` environment variables
//! 4. Command-line flags, applied by [`crate::cli::Cli::apply_to`]
//!
//! [`Config::into_finder_config`] validates the merged values and produces
//! the immutable [`FinderConfig`] used for one run.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::duplicates::{FinderConfig, SpillMode, DEFAULT_MAX_CONCURRENT};
use crate::output::OutputFormat;
use crate::scanner::{DEFAULT_CHUNK_SIZE, LARGE_FILE_THRESHOLD};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DUPESCAN_";

/// Errors raised while loading or validating configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// No root path was given.
    #[error("Path can not be empty")]
    EmptyPath,

    /// The concurrency limit is zero or negative.
    #[error("Max concurrent must be greater than 0, got {0}")]
    InvalidLimit(i64),

    /// The streaming chunk size is zero.
    #[error("Chunk size must be greater than 0")]
    InvalidChunkSize,

    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    MissingFile(PathBuf),

    /// The config sources could not be merged or parsed.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Concurrency limit; signed so that negative values reach validation.
    pub max_concurrent: i64,
    /// Skip files smaller than this many KiB (0 = no filter).
    pub skip_kb: u64,
    /// Tolerate path-level errors.
    pub ignore_errors: bool,
    /// Fingerprint storage during the run.
    pub spill: SpillMode,
    /// Directory for the spill file.
    pub spill_dir: Option<PathBuf>,
    /// Keep the spill file when the run aborts.
    pub keep_spill_on_error: bool,
    /// Files larger than this many bytes are fingerprinted in chunks.
    pub large_file_threshold: u64,
    /// Chunk size in bytes for the streaming strategy.
    pub chunk_size: usize,
    /// Report format.
    pub format: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT as i64,
            skip_kb: 0,
            ignore_errors: true,
            spill: SpillMode::Memory,
            spill_dir: None,
            keep_spill_on_error: false,
            large_file_threshold: LARGE_FILE_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            format: OutputFormat::Text,
        }
    }
}

impl Config {
    /// Load configuration from defaults, a TOML file and the environment.
    ///
    /// `explicit` must exist when given. Otherwise the platform config file
    /// is used if present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFile`] for a missing explicit file and
    /// [`ConfigError::Load`] when a source fails to parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::figment(explicit)?
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Build the layered figment without extracting it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFile`] for a missing explicit file.
    pub fn figment(explicit: Option<&Path>) -> Result<Figment, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::MissingFile(path.to_path_buf()));
                }
                log::debug!("Loading config from {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(path) = Self::default_path().filter(|p| p.is_file()) {
                    log::debug!("Loading config from {}", path.display());
                    figment = figment.merge(Toml::file(path));
                }
            }
        }

        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// Platform-specific default config file location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "dupescan", "dupescan")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Check the merged values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLimit`] for a limit ≤ 0 and
    /// [`ConfigError::InvalidChunkSize`] for a zero chunk size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent <= 0 {
            return Err(ConfigError::InvalidLimit(self.max_concurrent));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        Ok(())
    }

    /// Validate and convert into the finder's run configuration.
    ///
    /// # Errors
    ///
    /// See [`Config::validate`].
    pub fn into_finder_config(self) -> Result<FinderConfig, ConfigError> {
        self.validate()?;

        let limit = usize::try_from(self.max_concurrent)
            .map_err(|_| ConfigError::InvalidLimit(self.max_concurrent))?;
        let mut finder = FinderConfig::default()
            .with_max_concurrent(limit)
            .with_min_size(self.skip_kb.saturating_mul(1024))
            .with_ignore_errors(self.ignore_errors)
            .with_spill(self.spill)
            .with_keep_spill_on_error(self.keep_spill_on_error)
            .with_large_file_threshold(self.large_file_threshold)
            .with_chunk_size(self.chunk_size);
        if let Some(dir) = self.spill_dir {
            finder = finder.with_spill_dir(dir);
        }
        Ok(finder)
    }
}
