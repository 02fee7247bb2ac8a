//! Audio clocks
//!
//! All scheduling is relative to an [`AudioClock`], never to wall time. The
//! device clock advances only as output frames are rendered, so position math
//! is unaffected by the host being suspended.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic clock in seconds
pub trait AudioClock: Send + Sync {
    /// Current clock time in seconds
    fn now(&self) -> f64;
}

/// Clock driven by the output callback's rendered frame count
#[derive(Debug, Clone)]
pub struct DeviceClock {
    frames_rendered: Arc<AtomicU64>,
    sample_rate: u32,
}

impl DeviceClock {
    /// Create a clock reading the shared frame counter at `sample_rate`
    pub fn new(frames_rendered: Arc<AtomicU64>, sample_rate: u32) -> Self {
        Self {
            frames_rendered,
            sample_rate: sample_rate.max(1),
        }
    }

    /// Total frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames_rendered.load(Ordering::Acquire)
    }

    /// Device sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioClock for DeviceClock {
    fn now(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Clock that only moves when advanced explicitly
///
/// Used for offline rendering and deterministic tests.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `secs`
    pub fn advance(&self, secs: f64) {
        let delta = (secs.max(0.0) * 1_000_000.0).round() as u64;
        self.micros.fetch_add(delta, Ordering::AcqRel);
    }

    /// Jump to an absolute time; earlier times are ignored to stay monotonic
    pub fn set(&self, secs: f64) {
        let target = (secs.max(0.0) * 1_000_000.0).round() as u64;
        self.micros.fetch_max(target, Ordering::AcqRel);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        self.micros.load(Ordering::Acquire) as f64 / 1_000_000.0
    }
}
