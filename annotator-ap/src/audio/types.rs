//! Core audio data types
//!
//! Defines structures for decoded chunk buffers and output frames.

/// PcmBuffer holds one decoded chunk as linear PCM.
///
/// **Format:**
/// - Samples are f32 (floating point -1.0 to 1.0)
/// - Interleaved by channel: [L, R, L, R, ...] for stereo, plain for mono
/// - Sample rate is the track sample rate (decoder resamples if needed)
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    /// Interleaved PCM samples
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Channel count (1 or 2)
    pub channels: u16,

    /// Number of frames (samples.len() / channels)
    pub frames: usize,
}

impl PcmBuffer {
    /// Create a new buffer from interleaved samples
    ///
    /// A trailing partial frame is dropped.
    pub fn new(mut samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let frames = samples.len() / channels as usize;
        samples.truncate(frames * channels as usize);

        Self {
            samples,
            sample_rate,
            channels,
            frames,
        }
    }

    /// Create a silent buffer of the given length
    pub fn silence(frames: usize, sample_rate: u32, channels: u16) -> Self {
        Self::new(vec![0.0; frames * channels.max(1) as usize], sample_rate, channels)
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f64 / self.sample_rate as f64
    }

    /// Sample at an integer frame/channel position (0.0 past the end)
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        if frame >= self.frames {
            return 0.0;
        }
        let channel = channel.min(self.channels as usize - 1);
        self.samples[frame * self.channels as usize + channel]
    }

    /// Stereo frame at a fractional frame position, linearly interpolated
    ///
    /// Mono buffers are duplicated to both channels.
    pub fn frame_at(&self, position: f64) -> AudioFrame {
        if position < 0.0 || self.frames == 0 {
            return AudioFrame::zero();
        }

        let index = position.floor() as usize;
        if index >= self.frames {
            return AudioFrame::zero();
        }
        let frac = (position - index as f64) as f32;
        let next = (index + 1).min(self.frames - 1);

        let lerp = |channel: usize| {
            let a = self.sample(index, channel);
            let b = self.sample(next, channel);
            a + (b - a) * frac
        };

        AudioFrame {
            left: lerp(0),
            right: lerp(1),
        }
    }

    /// Keep at most `max_frames` frames
    pub fn truncate_frames(&mut self, max_frames: usize) {
        if self.frames > max_frames {
            self.samples.truncate(max_frames * self.channels as usize);
            self.frames = max_frames;
        }
    }
}

/// AudioFrame represents a single stereo sample (one frame of audio).
///
/// Used for passing audio data between the voice mixer and output device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFrame {
    /// Left channel sample
    pub left: f32,

    /// Right channel sample
    pub right: f32,
}

impl AudioFrame {
    /// Create a silent frame (0.0, 0.0)
    pub fn zero() -> Self {
        AudioFrame { left: 0.0, right: 0.0 }
    }

    /// Add another frame into this one
    pub fn accumulate(&mut self, other: AudioFrame) {
        self.left += other.left;
        self.right += other.right;
    }

    /// Clamp both channels to [-1.0, 1.0]
    pub fn clamped(self) -> AudioFrame {
        AudioFrame {
            left: self.left.clamp(-1.0, 1.0),
            right: self.right.clamp(-1.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_buffer_frames_and_duration() {
        let buffer = PcmBuffer::new(vec![0.0; 8_000], 4_000, 2);
        assert_eq!(buffer.frames, 4_000);
        assert!((buffer.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_frame_dropped() {
        let buffer = PcmBuffer::new(vec![0.1, 0.2, 0.3], 100, 2);
        assert_eq!(buffer.frames, 1);
        assert_eq!(buffer.samples.len(), 2);
    }

    #[test]
    fn test_mono_duplicated_to_stereo() {
        let buffer = PcmBuffer::new(vec![0.5, -0.5], 100, 1);
        let frame = buffer.frame_at(0.0);
        assert_eq!(frame.left, 0.5);
        assert_eq!(frame.right, 0.5);
    }

    #[test]
    fn test_linear_interpolation() {
        let buffer = PcmBuffer::new(vec![0.0, 0.0, 1.0, -1.0], 100, 2);
        let frame = buffer.frame_at(0.5);
        assert!((frame.left - 0.5).abs() < 1e-6);
        assert!((frame.right + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_frame_past_end_is_silent() {
        let buffer = PcmBuffer::new(vec![1.0, 1.0], 100, 2);
        assert_eq!(buffer.frame_at(3.0), AudioFrame::zero());
        assert_eq!(buffer.frame_at(-1.0), AudioFrame::zero());
    }

    #[test]
    fn test_truncate_frames() {
        let mut buffer = PcmBuffer::silence(100, 10, 2);
        buffer.truncate_frames(40);
        assert_eq!(buffer.frames, 40);
        assert_eq!(buffer.samples.len(), 80);

        buffer.truncate_frames(60);
        assert_eq!(buffer.frames, 40);
    }
}
