//! In-memory WAV fixtures
//!
//! Chunks served by the test HTTP server are generated here with hound so
//! the decoder sees real container bytes.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;

fn write_wav(
    sample_rate: u32,
    channels: u16,
    frames: usize,
    mut sample: impl FnMut(usize) -> f32,
) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for frame in 0..frames {
            let value = (sample(frame).clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(value)?;
            }
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Silent 16-bit WAV of `frames` frames
pub fn silent_wav(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
    write_wav(sample_rate, channels, frames, |_| 0.0).expect("write silent wav")
}

/// 16-bit WAV sine at `frequency` Hz, amplitude 0.5
pub fn sine_wav(sample_rate: u32, channels: u16, frames: usize, frequency: f32) -> Vec<u8> {
    write_wav(sample_rate, channels, frames, |frame| {
        0.5 * (2.0 * PI * frequency * frame as f32 / sample_rate as f32).sin()
    })
    .expect("write sine wav")
}

/// Bytes no demuxer recognises (plain ASCII, so no frame sync words)
pub fn garbage_bytes() -> Vec<u8> {
    b"this is not audio data. ".repeat(200)
}
