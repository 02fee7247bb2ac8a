//! Error types for annotator-ap
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for annotator-ap
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Invalid construction parameters (track metadata, engine configuration)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Chunk fetch failed (transport error or non-success status)
    #[error("Network error: {0}")]
    Network(String),

    /// Fetched bytes could not be decoded into PCM
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Invalid request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Control request sent after the engine shut down
    #[error("Playback engine stopped")]
    EngineStopped,

    /// Shared configuration errors
    #[error("Common error: {0}")]
    Common(String),
}

impl From<annotator_common::Error> for Error {
    fn from(err: annotator_common::Error) -> Self {
        Error::Common(err.to_string())
    }
}

impl Error {
    /// Whether this error came from fetching or decoding a chunk
    pub fn is_load_failure(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Decode(_))
    }
}

/// Convenience Result type using annotator-ap Error
pub type Result<T> = std::result::Result<T, Error>;
