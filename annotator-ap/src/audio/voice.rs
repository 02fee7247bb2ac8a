//! Real-time voice mixer
//!
//! A voice is one scheduled playback instance rendered by the output
//! callback. Voices stay silent until their start frame, read their buffer at
//! `rate * buffer_rate / device_rate` frames per output frame, and notify once
//! their scheduled range has been consumed.
//!
//! The mixer runs on the audio thread: no locks, no blocking. Voices leaving
//! the mix go back over [`RetiredVoices`] so their notifiers run and their
//! buffers are freed elsewhere.

use crate::audio::output::{EndedNotifier, PlaybackId, ScheduledPlayback};
use crate::audio::types::{AudioFrame, PcmBuffer};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Command sent from the engine to the audio callback
#[derive(Debug)]
pub enum VoiceCommand {
    /// Begin rendering a voice
    Start(Box<Voice>),
    /// Drop a voice without notifying
    Stop(PlaybackId),
}

/// One playback instance on the audio thread
#[derive(Debug)]
pub struct Voice {
    id: PlaybackId,
    buffer: Arc<PcmBuffer>,
    /// Device frame at which output begins
    start_frame: u64,
    /// Current read position in buffer frames
    read_pos: f64,
    /// Read position at which the voice ends
    end_pos: f64,
    /// Buffer frames consumed per device frame
    step: f64,
    on_ended: Option<EndedNotifier>,
}

impl Voice {
    /// Build a voice for `playback` on a device running at `device_rate`
    pub fn new(playback: ScheduledPlayback, on_ended: Option<EndedNotifier>, device_rate: u32) -> Self {
        let device_rate = device_rate.max(1) as f64;
        let buffer_rate = playback.buffer.sample_rate.max(1) as f64;
        let rate = if playback.rate.is_finite() && playback.rate > 0.0 {
            playback.rate
        } else {
            1.0
        };

        let read_pos = playback.offset.max(0.0) * buffer_rate;
        let end_pos = ((playback.offset + playback.duration.max(0.0)) * buffer_rate)
            .min(playback.buffer.frames as f64);

        Self {
            id: playback.id,
            start_frame: (playback.start_at.max(0.0) * device_rate).round() as u64,
            read_pos,
            end_pos,
            step: rate * buffer_rate / device_rate,
            buffer: playback.buffer,
            on_ended,
        }
    }

    /// Playback id this voice renders
    pub fn id(&self) -> PlaybackId {
        self.id
    }

    fn is_finished(&self) -> bool {
        self.read_pos >= self.end_pos
    }

    /// Render one device frame; silent before the start frame
    fn next_frame(&mut self, device_frame: u64) -> AudioFrame {
        if device_frame < self.start_frame || self.is_finished() {
            return AudioFrame::zero();
        }
        let frame = self.buffer.frame_at(self.read_pos);
        self.read_pos += self.step;
        frame
    }
}

/// Capacity of the callback → forwarder queue of retired voices
pub const RETIRED_QUEUE_CAPACITY: usize = 256;

/// A voice taken out of the mix, handed back for notification and drop
#[derive(Debug)]
pub struct RetiredVoice {
    voice: Box<Voice>,
    /// True when the voice rendered its whole range, false when stopped
    ended: bool,
}

/// Receiving end of the retired-voice queue
///
/// Drained off the real-time thread: ended notifiers run here and the
/// voices (with their last buffer references) are dropped here.
pub struct RetiredVoices {
    consumer: HeapCons<RetiredVoice>,
}

impl RetiredVoices {
    /// Notify every ended voice and drop everything retired so far
    ///
    /// Returns the number of voices released.
    pub fn dispatch(&mut self) -> usize {
        let mut released = 0;
        while let Some(retired) = self.consumer.try_pop() {
            if retired.ended {
                if let Some(notifier) = retired.voice.on_ended.as_ref() {
                    notifier.notify(retired.voice.id);
                }
            }
            released += 1;
        }
        released
    }
}

/// Mixes all active voices and counts rendered frames for the device clock
pub struct VoiceMixer {
    voices: Vec<Box<Voice>>,
    retired: HeapProd<RetiredVoice>,
    /// Retired voices that did not fit in the queue yet
    deferred: Vec<RetiredVoice>,
    frames_rendered: Arc<AtomicU64>,
    position: u64,
    device_rate: u32,
}

impl VoiceMixer {
    /// Create a mixer that publishes its rendered frame count to `frames_rendered`
    pub fn new(device_rate: u32, frames_rendered: Arc<AtomicU64>) -> (Self, RetiredVoices) {
        Self::with_retired_capacity(device_rate, frames_rendered, RETIRED_QUEUE_CAPACITY)
    }

    pub fn with_retired_capacity(
        device_rate: u32,
        frames_rendered: Arc<AtomicU64>,
        capacity: usize,
    ) -> (Self, RetiredVoices) {
        let (producer, consumer) = HeapRb::<RetiredVoice>::new(capacity.max(1)).split();
        let position = frames_rendered.load(Ordering::Acquire);
        let mixer = Self {
            voices: Vec::with_capacity(16),
            retired: producer,
            deferred: Vec::with_capacity(16),
            frames_rendered,
            position,
            device_rate,
        };
        (mixer, RetiredVoices { consumer })
    }

    /// Device sample rate
    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }

    /// Number of voices currently held (waiting or sounding)
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Retired voices waiting for room in the queue
    pub fn deferred_voices(&self) -> usize {
        self.deferred.len()
    }

    /// Apply one engine command
    pub fn apply(&mut self, command: VoiceCommand) {
        match command {
            VoiceCommand::Start(voice) => self.voices.push(voice),
            VoiceCommand::Stop(id) => {
                if let Some(idx) = self.voices.iter().position(|voice| voice.id == id) {
                    let voice = self.voices.swap_remove(idx);
                    self.retire(voice, false);
                }
            }
        }
    }

    /// Fill an interleaved output buffer of `channels` channels
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        self.flush_deferred();
        let channels = channels.max(1);
        for frame in out.chunks_mut(channels) {
            let mixed = self.render_frame();
            match frame.len() {
                1 => frame[0] = (mixed.left + mixed.right) * 0.5,
                _ => {
                    frame[0] = mixed.left;
                    frame[1] = mixed.right;
                    for extra in frame.iter_mut().skip(2) {
                        *extra = 0.0;
                    }
                }
            }
        }
        self.frames_rendered.store(self.position, Ordering::Release);
    }

    /// Render a single stereo frame and advance the clock by one frame
    pub fn render_frame(&mut self) -> AudioFrame {
        let device_frame = self.position;
        let mut mixed = AudioFrame::zero();
        let mut any_finished = false;

        for voice in self.voices.iter_mut() {
            mixed.accumulate(voice.next_frame(device_frame));
            any_finished |= voice.is_finished();
        }

        if any_finished {
            self.retire_finished();
        }

        self.position += 1;
        mixed.clamped()
    }

    fn retire_finished(&mut self) {
        let mut idx = 0;
        while idx < self.voices.len() {
            if self.voices[idx].is_finished() {
                let voice = self.voices.swap_remove(idx);
                self.retire(voice, true);
            } else {
                idx += 1;
            }
        }
    }

    fn retire(&mut self, voice: Box<Voice>, ended: bool) {
        self.flush_deferred();
        let retired = RetiredVoice { voice, ended };
        if !self.deferred.is_empty() {
            self.deferred.push(retired);
            return;
        }
        if let Err(retired) = self.retired.try_push(retired) {
            self.deferred.push(retired);
        }
    }

    /// Move deferred voices into the queue, oldest first
    fn flush_deferred(&mut self) {
        while !self.deferred.is_empty() {
            let retired = self.deferred.remove(0);
            if let Err(retired) = self.retired.try_push(retired) {
                self.deferred.insert(0, retired);
                break;
            }
        }
    }
}
