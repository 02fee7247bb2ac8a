//! Bootstrap configuration loading and config file resolution
//!
//! The bootstrap file is TOML with two optional sections:
//!
//! ```toml
//! [engine]
//! chunk_duration_secs = 60.0
//! window_size = 3
//! start_gap_ms = 100
//! listen_interval_ms = 1000
//! chunk_extension = "mp3"
//! output_device = "default"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every field is optional. Values missing from the file fall back to the
//! built-in defaults of the consuming crate.
//!
//! # Resolution priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`ANNOTATOR_CONFIG`)
//! 3. Platform config directory (`<config_dir>/annotator/config.toml`)
//! 4. None (built-in defaults only)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ANNOTATOR_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Playback engine overrides
    #[serde(default)]
    pub engine: EngineSection,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[engine]` section; every field overrides a built-in default when present
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineSection {
    /// Length of one chunk in seconds
    #[serde(default)]
    pub chunk_duration_secs: Option<f64>,

    /// Number of chunks kept resident (current + look-ahead)
    #[serde(default)]
    pub window_size: Option<usize>,

    /// Gap added before the first scheduled start of a play session
    #[serde(default)]
    pub start_gap_ms: Option<u64>,

    /// Interval between position reports while playing
    #[serde(default)]
    pub listen_interval_ms: Option<u64>,

    /// File extension of chunk files (without the dot)
    #[serde(default)]
    pub chunk_extension: Option<String>,

    /// Output device name (None = default device)
    #[serde(default)]
    pub output_device: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a file
    ///
    /// Fails if the file cannot be read or is not valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults when no file exists
    ///
    /// A missing file is not an error: a warning is logged and defaults are
    /// returned. A file that exists but cannot be parsed is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::load(path),
            Some(path) => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                debug!("No config file configured, using built-in defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Resolve which config file to use, following the priority order above
///
/// Returns `None` when neither an explicit path nor a platform config file is
/// available.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path().filter(|path| path.exists())
}

/// Platform default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("annotator").join("config.toml"))
}

/// Reject a log level string that tracing would not understand
pub fn validate_log_level(level: &str) -> Result<()> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        other => Err(Error::Config(format!("Unknown log level '{}'", other))),
    }
}
