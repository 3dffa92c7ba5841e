use clap::Parser;
use dupescan::cli::Cli;
use dupescan::config::{Config, ConfigError};
use dupescan::duplicates::SpillMode;
use dupescan::output::OutputFormat;
use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_config_load_defaults() {
    // Use figment directly without Env to avoid interference from other tests
    let figment = Figment::from(Serialized::defaults(Config::default()));
    let config: Config = figment.extract().unwrap();
    assert_eq!(config.max_concurrent, 10);
    assert!(config.ignore_errors);
    assert_eq!(config.spill, SpillMode::Memory);
    assert_eq!(config.chunk_size, 8 * 1024);
    assert_eq!(config.large_file_threshold, 512 * 1024 * 1024);
}

#[test]
fn test_config_load_from_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    let toml_content = r#"
max_concurrent = 4
skip_kb = 16
ignore_errors = false
spill = "file"
spill_dir = "/var/tmp"
format = "json"
"#;
    fs::write(&config_path, toml_content).unwrap();

    let figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&config_path));
    let config: Config = figment.extract().unwrap();

    assert_eq!(config.max_concurrent, 4);
    assert_eq!(config.skip_kb, 16);
    assert!(!config.ignore_errors);
    assert_eq!(config.spill, SpillMode::File);
    assert_eq!(config.spill_dir, Some(PathBuf::from("/var/tmp")));
    assert_eq!(config.format, OutputFormat::Json);
    // Unset keys keep their defaults
    assert_eq!(config.chunk_size, 8 * 1024);
}

#[test]
fn test_env_overrides_file_and_cli_overrides_env() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("layered.toml");
    fs::write(&config_path, "large_file_threshold = 1000\nkeep_spill_on_error = false\n").unwrap();

    std::env::set_var("DUPESCAN_LARGE_FILE_THRESHOLD", "2000");
    std::env::set_var("DUPESCAN_KEEP_SPILL_ON_ERROR", "true");
    let loaded = Config::load(Some(&config_path));
    std::env::remove_var("DUPESCAN_LARGE_FILE_THRESHOLD");
    std::env::remove_var("DUPESCAN_KEEP_SPILL_ON_ERROR");

    let mut config = loaded.unwrap();
    assert_eq!(config.large_file_threshold, 2000);
    assert!(config.keep_spill_on_error);

    let cli = Cli::try_parse_from(["dupescan", "-p", "/x", "--large-file-threshold", "3000"])
        .unwrap();
    cli.apply_to(&mut config);
    assert_eq!(config.large_file_threshold, 3000);
}

#[test]
fn test_config_invalid_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "max_concurrent = \"many\"").unwrap();

    let result = Config::load(Some(&config_path));
    assert!(matches!(result, Err(ConfigError::Load(_))));
}

#[test]
fn test_config_malformed_toml() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "invalid = = toml").unwrap();

    let figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&config_path));
    let result: Result<Config, _> = figment.extract();
    assert!(result.is_err());
}

#[test]
fn test_config_save_toml() {
    let config = Config {
        max_concurrent: 2,
        spill: SpillMode::File,
        ..Default::default()
    };

    let content = toml::to_string_pretty(&config).unwrap();
    assert!(content.contains("max_concurrent = 2"));
    assert!(content.contains("spill = \"file\""));

    let parsed: Config = Figment::from(Toml::string(&content)).extract().unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_config_file_limit_validated() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "max_concurrent = -2\n").unwrap();

    let figment =
        Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(&config_path));
    let config: Config = figment.extract().unwrap();
    assert!(matches!(
        config.into_finder_config(),
        Err(ConfigError::InvalidLimit(-2))
    ));
}
