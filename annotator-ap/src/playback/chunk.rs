//! Track metadata and chunk addressing
//!
//! A track is split into fixed-length chunks. Chunk `idx` covers
//! `[idx * C, min((idx + 1) * C, duration))` and is fetched from
//! `{chunk_base_url}{idx}.{ext}`.

use crate::error::{Error, Result};
use reqwest::Url;

/// The whole recording; immutable for the engine's lifetime
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    duration: f64,
    sample_rate: u32,
    chunk_base_url: String,
    chunk_duration: f64,
}

impl Track {
    /// Validate and build track metadata
    ///
    /// # Errors
    /// `Error::Config` for a non-positive or non-finite duration or chunk
    /// duration, a zero sample rate, or a base URL that does not parse.
    pub fn new(
        duration: f64,
        sample_rate: u32,
        chunk_base_url: impl Into<String>,
        chunk_duration: f64,
    ) -> Result<Self> {
        let chunk_base_url = chunk_base_url.into();

        if !duration.is_finite() || duration <= 0.0 {
            return Err(Error::Config(format!(
                "Track duration must be positive, got {}",
                duration
            )));
        }
        if sample_rate == 0 {
            return Err(Error::Config("Sample rate must be non-zero".to_string()));
        }
        if !chunk_duration.is_finite() || chunk_duration <= 0.0 {
            return Err(Error::Config(format!(
                "Chunk duration must be positive, got {}",
                chunk_duration
            )));
        }
        Url::parse(&chunk_base_url).map_err(|e| {
            Error::Config(format!("Invalid chunk base URL {:?}: {}", chunk_base_url, e))
        })?;

        Ok(Self {
            duration,
            sample_rate,
            chunk_base_url,
            chunk_duration,
        })
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn chunk_base_url(&self) -> &str {
        &self.chunk_base_url
    }

    pub fn chunk_duration(&self) -> f64 {
        self.chunk_duration
    }

    /// `ceil(duration / chunk_duration)`
    pub fn chunk_count(&self) -> usize {
        ((self.duration / self.chunk_duration).ceil() as usize).max(1)
    }

    /// Highest valid chunk index
    pub fn max_idx(&self) -> usize {
        self.chunk_count() - 1
    }

    /// Chunk containing `time`, or None outside `[0, duration]`
    ///
    /// `time == duration` maps to the last chunk.
    pub fn chunk_index_of(&self, time: f64) -> Option<usize> {
        if !time.is_finite() || time < 0.0 || time > self.duration {
            return None;
        }
        let idx = (time / self.chunk_duration).floor() as usize;
        Some(idx.min(self.max_idx()))
    }

    /// Track time at which chunk `idx` begins
    pub fn chunk_start(&self, idx: usize) -> f64 {
        idx as f64 * self.chunk_duration
    }

    /// Track time at which chunk `idx` ends
    pub fn chunk_end(&self, idx: usize) -> f64 {
        ((idx + 1) as f64 * self.chunk_duration).min(self.duration)
    }

    /// Length of chunk `idx` in seconds; the last chunk may be shorter
    pub fn chunk_len(&self, idx: usize) -> f64 {
        (self.chunk_end(idx) - self.chunk_start(idx)).max(0.0)
    }

    /// Number of PCM frames chunk `idx` holds at the track sample rate
    pub fn num_samples(&self, idx: usize) -> usize {
        (self.chunk_len(idx) * self.sample_rate as f64).round() as usize
    }

    /// `{chunk_base_url}{idx}.{extension}`
    pub fn chunk_url(&self, idx: usize, extension: &str) -> String {
        format!("{}{}.{}", self.chunk_base_url, idx, extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(duration: f64) -> Track {
        Track::new(duration, 44_100, "http://localhost/audio/chunk_", 60.0).unwrap()
    }

    #[test]
    fn test_chunk_count_rounds_up() {
        assert_eq!(track(185.0).chunk_count(), 4);
        assert_eq!(track(180.0).chunk_count(), 3);
        assert_eq!(track(10.0).chunk_count(), 1);
    }

    #[test]
    fn test_chunk_index_of() {
        let t = track(185.0);
        assert_eq!(t.chunk_index_of(0.0), Some(0));
        assert_eq!(t.chunk_index_of(59.999), Some(0));
        assert_eq!(t.chunk_index_of(60.0), Some(1));
        assert_eq!(t.chunk_index_of(185.0), Some(3));
        assert_eq!(t.chunk_index_of(-0.1), None);
        assert_eq!(t.chunk_index_of(185.1), None);
        assert_eq!(t.chunk_index_of(f64::NAN), None);
    }

    #[test]
    fn test_exact_multiple_end_maps_to_last_chunk() {
        let t = track(180.0);
        assert_eq!(t.chunk_index_of(180.0), Some(2));
    }

    #[test]
    fn test_last_chunk_is_shorter() {
        let t = track(185.0);
        assert_eq!(t.chunk_len(0), 60.0);
        assert!((t.chunk_len(3) - 5.0).abs() < 1e-9);
        assert_eq!(t.num_samples(3), 5 * 44_100);
        assert_eq!(t.chunk_end(2), t.chunk_start(3));
    }

    #[test]
    fn test_chunk_url_format() {
        let t = track(185.0);
        assert_eq!(t.chunk_url(2, "mp3"), "http://localhost/audio/chunk_2.mp3");
    }

    #[test]
    fn test_rejects_invalid_metadata() {
        assert!(matches!(Track::new(0.0, 44_100, "http://a/", 60.0), Err(Error::Config(_))));
        assert!(matches!(Track::new(f64::INFINITY, 44_100, "http://a/", 60.0), Err(Error::Config(_))));
        assert!(matches!(Track::new(10.0, 0, "http://a/", 60.0), Err(Error::Config(_))));
        assert!(matches!(Track::new(10.0, 44_100, "http://a/", 0.0), Err(Error::Config(_))));
        assert!(matches!(Track::new(10.0, 44_100, "not a url", 60.0), Err(Error::Config(_))));
    }
}
