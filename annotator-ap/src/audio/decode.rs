//! Chunk decoding using symphonia
//!
//! Converts the encoded bytes of one chunk into linear PCM at the track
//! sample rate.
//!
//! # Supported Formats
//!
//! Per Cargo.toml symphonia features: MP3, FLAC, AAC, MP4/M4A, Vorbis, WAV/PCM.
//!
//! # Sample Format
//!
//! - Output: interleaved f32 samples
//! - Mono and stereo sources keep their channel count
//! - Multi-channel sources are downmixed to stereo

use crate::audio::resampler::Resampler;
use crate::audio::types::PcmBuffer;
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decode capability: encoded bytes in, PCM out
pub trait ChunkDecoder: Send + Sync {
    /// Decode `bytes` to PCM at `sample_rate`, keeping at most `num_samples` frames
    ///
    /// `num_samples == 0` keeps everything that was decoded.
    fn decode(&self, bytes: Vec<u8>, sample_rate: u32, num_samples: usize) -> Result<PcmBuffer>;
}

/// Symphonia-backed decoder
///
/// # Examples
///
/// ```ignore
/// let decoder = SymphoniaDecoder::with_extension("mp3");
/// let pcm = decoder.decode(bytes, 44_100, 44_100 * 60)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct SymphoniaDecoder {
    /// File extension passed to the format probe
    extension_hint: Option<String>,
}

impl SymphoniaDecoder {
    /// Create a decoder that probes without a format hint
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder that hints the probe with a file extension
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension_hint: Some(extension.into()),
        }
    }
}

impl ChunkDecoder for SymphoniaDecoder {
    fn decode(&self, bytes: Vec<u8>, sample_rate: u32, num_samples: usize) -> Result<PcmBuffer> {
        if bytes.is_empty() {
            return Err(Error::Decode("Empty chunk".to_string()));
        }

        let byte_len = bytes.len();
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = self.extension_hint.as_deref() {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Unrecognized audio format: {}", e)))?;
        let mut format = probed.format;

        let (track_id, codec_params) = {
            let track = format
                .default_track()
                .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;
            (track.id, track.codec_params.clone())
        };

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Unsupported codec: {}", e)))?;

        let mut native_rate = codec_params.sample_rate;
        let mut out_channels: Option<usize> = None;
        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(Error::Decode(format!("Failed to read packet: {}", e))),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt packet: skip it, keep the rest of the chunk
                    warn!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(SymphoniaError::IoError(_)) => break,
                Err(e) => return Err(Error::Decode(format!("Decoder failure: {}", e))),
            };

            let spec = *decoded.spec();
            native_rate.get_or_insert(spec.rate);
            let source_channels = spec.channels.count().max(1);

            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            let channels = *out_channels.get_or_insert(source_channels.min(2));
            push_downmixed(&mut samples, sample_buf.samples(), source_channels, channels);
        }

        let channels = out_channels.unwrap_or(1);
        if samples.is_empty() {
            return Err(Error::Decode(format!(
                "No audio decoded from {} bytes",
                byte_len
            )));
        }

        let native_rate = native_rate
            .ok_or_else(|| Error::Decode("Unknown source sample rate".to_string()))?;
        let samples = Resampler::resample(&samples, native_rate, sample_rate, channels as u16)?;

        let mut buffer = PcmBuffer::new(samples, sample_rate, channels as u16);
        if num_samples > 0 {
            buffer.truncate_frames(num_samples);
        }

        debug!(
            "Decoded {} bytes into {} frames ({} ch, {}Hz -> {}Hz)",
            byte_len, buffer.frames, channels, native_rate, sample_rate
        );

        Ok(buffer)
    }
}

/// Append `input` (interleaved, `source_channels` wide) to `out` as `out_channels` wide
fn push_downmixed(out: &mut Vec<f32>, input: &[f32], source_channels: usize, out_channels: usize) {
    if source_channels == out_channels {
        out.extend_from_slice(input);
        return;
    }

    for frame in input.chunks_exact(source_channels) {
        match out_channels {
            1 => {
                let sum: f32 = frame.iter().sum();
                out.push(sum / source_channels as f32);
            }
            _ => {
                // Even channels to the left, odd channels to the right
                let mut left = 0.0f32;
                let mut right = 0.0f32;
                for (ch_idx, &sample) in frame.iter().enumerate() {
                    if ch_idx % 2 == 0 {
                        left += sample;
                    } else {
                        right += sample;
                    }
                }
                let half = (source_channels as f32 / 2.0).max(1.0);
                out.push(left / half);
                out.push(right / half);
            }
        }
    }
}
