//! # Annotator Common Library
//!
//! Shared code for the audio annotator crates:
//! - Error type
//! - Bootstrap configuration loading (TOML) and config path resolution
//! - Event types broadcast by the playback engine
//! - Timestamp formatting for position readouts

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;

pub use error::{Error, Result};
pub use events::{AnnotatorEvent, PlaybackStatus};
