//! Engine mailbox messages
//!
//! Every asynchronous input to the transport state machine arrives as one of
//! these messages and is handled to completion before the next one.

use crate::audio::output::PlaybackId;
use crate::audio::types::PcmBuffer;
use crate::error::Result;
use tokio::sync::oneshot;

/// Control request from the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    /// Play from `start` until `end` (both sanitized)
    Play { start: Option<f64>, end: Option<f64> },
    Pause,
    Seek { position: f64 },
    SetRate { rate: f64 },
    PlayPause,
}

/// Message delivered to the engine actor
#[derive(Debug)]
pub enum EngineMessage {
    /// Control request; the reply is sent once state has been updated
    Control {
        command: ControlCommand,
        reply: oneshot::Sender<Result<()>>,
    },

    /// A chunk load finished (exactly once per dispatched load)
    ChunkLoaded {
        idx: usize,
        result: Result<PcmBuffer>,
    },

    /// A playback instance rendered its whole range
    PlaybackEnded { id: PlaybackId },

    /// Tear down and stop the actor
    Shutdown { reply: oneshot::Sender<()> },
}
