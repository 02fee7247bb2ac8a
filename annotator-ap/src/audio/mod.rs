//! Audio decode, clock and device output

pub mod clock;
pub mod decode;
pub mod output;
pub mod resampler;
pub mod types;
pub mod voice;

pub use clock::{AudioClock, DeviceClock, ManualClock};
pub use decode::{ChunkDecoder, SymphoniaDecoder};
pub use output::{CommandOutbox, DeviceOutput, EndedNotifier, PlaybackId, PlaybackSink, ScheduledPlayback};
pub use resampler::Resampler;
pub use types::{AudioFrame, PcmBuffer};
pub use voice::{RetiredVoice, RetiredVoices, Voice, VoiceCommand, VoiceMixer};
