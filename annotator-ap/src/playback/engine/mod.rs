//! Playback engine module
//!
//! **Module Structure:**
//! - `core.rs`: transport state machine, window reconciliation, scheduling
//! - `handle.rs`: cloneable handle and the actor loop that owns the core

mod core;
mod handle;

pub use self::core::{EngineCore, EnginePorts};
pub use handle::PlaybackEngine;
