//! # Annotator Audio Player Library (annotator-ap)
//!
//! Chunked streaming playback engine for long recordings.
//!
//! **Purpose:** Fetch a recording chunk by chunk over HTTP, keep a bounded
//! window of decoded chunks resident, and schedule them back-to-back against
//! the output device's sample clock across seeks and rate changes.
//!
//! **Architecture:** symphonia + rubato decode, cpal output with a
//! frame-counting clock, and a single-task engine actor driven by messages.

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod state;

pub use config::{EngineConfig, EngineListeners};
pub use error::{Error, Result};
pub use playback::{PlaybackEngine, Track};
pub use state::SharedState;
