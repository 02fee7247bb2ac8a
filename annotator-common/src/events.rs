//! Event types broadcast by the playback engine
//!
//! These are the externally visible events. Internal engine messages
//! (load completions, ended notifications, timer ticks) live in the engine
//! crate and are never exposed here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport status as seen by UI collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// Never played, nothing pending
    Idle,
    /// Waiting for the chunk at the current position to be decoded
    Loading,
    /// Audio is being scheduled against the output clock
    Playing,
    /// Stopped at a known logical position
    Paused,
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackStatus::Idle => write!(f, "idle"),
            PlaybackStatus::Loading => write!(f, "loading"),
            PlaybackStatus::Playing => write!(f, "playing"),
            PlaybackStatus::Paused => write!(f, "paused"),
        }
    }
}

/// Annotator playback events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnnotatorEvent {
    /// Transport status changed
    StatusChanged {
        old_status: PlaybackStatus,
        new_status: PlaybackStatus,
        timestamp: DateTime<Utc>,
    },

    /// Periodic position report while playing
    PositionUpdate {
        position_secs: f64,
        timestamp: DateTime<Utc>,
    },

    /// Playback rate changed
    RateChanged {
        rate: f64,
        timestamp: DateTime<Utc>,
    },

    /// A chunk became resident
    ChunkLoaded {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    /// A chunk left the window and was dropped
    ChunkEvicted {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    /// A chunk could not be fetched or decoded
    LoadFailed {
        index: usize,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl AnnotatorEvent {
    /// Short name of the event variant, used in logs
    pub fn event_type(&self) -> &'static str {
        match self {
            AnnotatorEvent::StatusChanged { .. } => "StatusChanged",
            AnnotatorEvent::PositionUpdate { .. } => "PositionUpdate",
            AnnotatorEvent::RateChanged { .. } => "RateChanged",
            AnnotatorEvent::ChunkLoaded { .. } => "ChunkLoaded",
            AnnotatorEvent::ChunkEvicted { .. } => "ChunkEvicted",
            AnnotatorEvent::LoadFailed { .. } => "LoadFailed",
        }
    }

    /// Serialize as a single JSON line
    pub fn to_json_line(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| crate::Error::Internal(e.to_string()))
    }
}
