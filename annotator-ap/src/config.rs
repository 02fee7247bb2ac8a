//! annotator-ap specific configuration
//!
//! Runtime engine parameters and the collaborator callbacks supplied at
//! construction. Values come from built-in defaults, overridden by the
//! `[engine]` section of the bootstrap TOML file.

use crate::error::{Error, Result};
use annotator_common::config::EngineSection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default chunk length in seconds
pub const DEFAULT_CHUNK_DURATION_SECS: f64 = 60.0;

/// Default number of resident chunks (current + look-ahead)
pub const DEFAULT_WINDOW_SIZE: usize = 3;

/// Largest accepted window size
pub const MAX_WINDOW_SIZE: usize = 64;

/// Default gap before the first scheduled start of a play session
pub const DEFAULT_START_GAP_MS: u64 = 100;

/// Default position report interval
pub const DEFAULT_LISTEN_INTERVAL_MS: u64 = 1000;

/// Default chunk file extension
pub const DEFAULT_CHUNK_EXTENSION: &str = "mp3";

/// Playback engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Length of one chunk in seconds (the last chunk may be shorter)
    pub chunk_duration_secs: f64,
    /// Window size K
    pub window_size: usize,
    /// Start gap added to the first anchor of a play session
    pub start_gap_ms: u64,
    /// Position report interval while playing
    pub listen_interval_ms: u64,
    /// Chunk file extension without the dot
    pub chunk_extension: String,
    /// Output device name (None = default device)
    pub output_device: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_duration_secs: DEFAULT_CHUNK_DURATION_SECS,
            window_size: DEFAULT_WINDOW_SIZE,
            start_gap_ms: DEFAULT_START_GAP_MS,
            listen_interval_ms: DEFAULT_LISTEN_INTERVAL_MS,
            chunk_extension: DEFAULT_CHUNK_EXTENSION.to_string(),
            output_device: None,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by whatever the `[engine]` section sets
    pub fn from_section(section: &EngineSection) -> Self {
        let defaults = Self::default();
        Self {
            chunk_duration_secs: section
                .chunk_duration_secs
                .unwrap_or(defaults.chunk_duration_secs),
            window_size: section.window_size.unwrap_or(defaults.window_size),
            start_gap_ms: section.start_gap_ms.unwrap_or(defaults.start_gap_ms),
            listen_interval_ms: section
                .listen_interval_ms
                .unwrap_or(defaults.listen_interval_ms),
            chunk_extension: section
                .chunk_extension
                .clone()
                .unwrap_or(defaults.chunk_extension),
            output_device: section.output_device.clone().or(defaults.output_device),
        }
    }

    /// Reject parameters the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.chunk_duration_secs.is_finite() || self.chunk_duration_secs <= 0.0 {
            return Err(Error::Config(format!(
                "chunk_duration_secs must be positive, got {}",
                self.chunk_duration_secs
            )));
        }
        if self.window_size == 0 || self.window_size > MAX_WINDOW_SIZE {
            return Err(Error::Config(format!(
                "window_size must be between 1 and {}, got {}",
                MAX_WINDOW_SIZE, self.window_size
            )));
        }
        if self.listen_interval_ms == 0 {
            return Err(Error::Config(
                "listen_interval_ms must be at least 1".to_string(),
            ));
        }
        let ext = self.chunk_extension.trim();
        if ext.is_empty() || ext.contains('/') {
            return Err(Error::Config(format!(
                "Invalid chunk extension: {:?}",
                self.chunk_extension
            )));
        }
        Ok(())
    }

    /// Start gap in seconds
    pub fn start_gap_secs(&self) -> f64 {
        self.start_gap_ms as f64 / 1000.0
    }

    /// Position report interval
    pub fn listen_interval(&self) -> Duration {
        Duration::from_millis(self.listen_interval_ms)
    }
}

/// Error listener: receives a human-readable message per failed chunk load
pub type ErrorListener = Arc<dyn Fn(String) + Send + Sync>;

/// Position listener: receives the derived position in seconds
pub type ListenListener = Arc<dyn Fn(f64) + Send + Sync>;

/// Collaborator callbacks supplied at construction
#[derive(Clone)]
pub struct EngineListeners {
    pub on_error: ErrorListener,
    pub on_listen: ListenListener,
}

impl Default for EngineListeners {
    fn default() -> Self {
        Self {
            on_error: Arc::new(|_| {}),
            on_listen: Arc::new(|_| {}),
        }
    }
}

impl EngineListeners {
    pub fn with_on_error(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_error = Arc::new(f);
        self
    }

    pub fn with_on_listen(mut self, f: impl Fn(f64) + Send + Sync + 'static) -> Self {
        self.on_listen = Arc::new(f);
        self
    }
}

impl fmt::Debug for EngineListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineListeners").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_size, 3);
        assert_eq!(config.listen_interval(), Duration::from_millis(1000));
        assert!((config.start_gap_secs() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_section_overrides_defaults() {
        let section = EngineSection {
            chunk_duration_secs: Some(30.0),
            window_size: Some(5),
            chunk_extension: Some("ogg".to_string()),
            ..Default::default()
        };
        let config = EngineConfig::from_section(&section);
        assert_eq!(config.chunk_duration_secs, 30.0);
        assert_eq!(config.window_size, 5);
        assert_eq!(config.chunk_extension, "ogg");
        assert_eq!(config.start_gap_ms, DEFAULT_START_GAP_MS);
        assert_eq!(config.output_device, None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            EngineConfig { chunk_duration_secs: 0.0, ..Default::default() },
            EngineConfig { chunk_duration_secs: f64::NAN, ..Default::default() },
            EngineConfig { window_size: 0, ..Default::default() },
            EngineConfig { window_size: MAX_WINDOW_SIZE + 1, ..Default::default() },
            EngineConfig { window_size: usize::MAX, ..Default::default() },
            EngineConfig { listen_interval_ms: 0, ..Default::default() },
            EngineConfig { chunk_extension: "  ".to_string(), ..Default::default() },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(Error::Config(_))), "{:?}", config);
        }
    }

    #[test]
    fn test_validate_accepts_largest_window() {
        let config = EngineConfig {
            window_size: MAX_WINDOW_SIZE,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_oversized_window_from_section_is_rejected() {
        let section = EngineSection {
            window_size: Some(usize::MAX),
            ..Default::default()
        };
        let config = EngineConfig::from_section(&section);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_listeners_default_to_noop() {
        let listeners = EngineListeners::default();
        (listeners.on_error)("ignored".to_string());
        (listeners.on_listen)(1.0);
    }
}
