//! Integration tests for bootstrap configuration loading and resolution
//!
//! Covers:
//! - Missing config files fall back to defaults instead of failing
//! - Malformed config files are reported as errors
//! - Priority order: CLI argument > environment variable > platform default
//!
//! Note: Uses serial_test to prevent races on the ANNOTATOR_CONFIG
//! environment variable. Tests that touch it are marked with #[serial].

use annotator_common::config::{resolve_config_path, TomlConfig, CONFIG_ENV_VAR};
use annotator_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::{NamedTempFile, TempDir};

#[test]
fn test_load_full_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[engine]
chunk_duration_secs = 30.0
window_size = 4
start_gap_ms = 50
listen_interval_ms = 250
chunk_extension = "flac"
output_device = "pulse"

[logging]
level = "debug"
"#
    )
    .unwrap();

    let config = TomlConfig::load(file.path()).unwrap();
    assert_eq!(config.engine.chunk_duration_secs, Some(30.0));
    assert_eq!(config.engine.window_size, Some(4));
    assert_eq!(config.engine.start_gap_ms, Some(50));
    assert_eq!(config.engine.listen_interval_ms, Some(250));
    assert_eq!(config.engine.chunk_extension.as_deref(), Some("flac"));
    assert_eq!(config.engine.output_device.as_deref(), Some("pulse"));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_missing_config_file_does_not_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist.toml");

    let config = TomlConfig::load_or_default(Some(&missing)).unwrap();
    assert!(config.engine.window_size.is_none());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_no_config_path_uses_defaults() {
    let config = TomlConfig::load_or_default(None).unwrap();
    assert!(config.engine.chunk_extension.is_none());
}

#[test]
fn test_malformed_config_file_is_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[engine\nwindow_size = ").unwrap();

    let result = TomlConfig::load_or_default(Some(file.path()));
    assert!(matches!(result, Err(Error::Toml(_))));
}

#[test]
#[serial]
fn test_cli_argument_takes_precedence_over_env() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/annotator-from-env.toml");

    let cli = PathBuf::from("/tmp/annotator-from-cli.toml");
    let resolved = resolve_config_path(Some(&cli));
    assert_eq!(resolved, Some(cli));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_used_without_cli_argument() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/annotator-from-env.toml");

    let resolved = resolve_config_path(None);
    assert_eq!(resolved, Some(PathBuf::from("/tmp/annotator-from-env.toml")));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_blank_env_var_is_ignored() {
    env::set_var(CONFIG_ENV_VAR, "   ");

    let resolved = resolve_config_path(None);
    assert_ne!(resolved, Some(PathBuf::from("   ")));

    env::remove_var(CONFIG_ENV_VAR);
}
