//! Scheduler math
//!
//! All chunks of one play session are timed against a single [`Anchor`]:
//! track position `p` sounds at clock time `T0 + (p - p0) / rate`. Chunk
//! `i` therefore starts exactly where chunk `i - 1` ends, whenever each of
//! them happens to be scheduled.

use serde::{Deserialize, Serialize};

/// Clock time correlated with a known track position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Clock time `T0` in seconds
    pub clock_time: f64,
    /// Track position `p0` in seconds
    pub position: f64,
}

impl Anchor {
    pub fn new(clock_time: f64, position: f64) -> Self {
        Self {
            clock_time,
            position,
        }
    }

    /// Track position sounding at clock time `now`
    ///
    /// Before `T0` (during the start gap) this is `p0`.
    pub fn position_at(&self, now: f64, rate: f64) -> f64 {
        self.position + (now - self.clock_time).max(0.0) * rate
    }

    /// Clock time at which track position `position` sounds
    pub fn clock_time_of(&self, position: f64, rate: f64) -> f64 {
        self.clock_time + (position - self.position) / rate
    }
}

/// Inputs shared by every chunk planned in one schedule pass
#[derive(Debug, Clone, Copy)]
pub struct ScheduleContext {
    pub anchor: Anchor,
    pub rate: f64,
    /// Track position before which nothing is played again
    pub floor: f64,
    /// Track position at which playback stops
    pub end: f64,
    /// Current clock time
    pub now: f64,
}

/// Timing of one chunk's playback instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedRange {
    /// Clock time output begins
    pub start_at: f64,
    /// Offset into the chunk buffer (seconds of buffer time)
    pub offset: f64,
    /// Played length (seconds of buffer time)
    pub duration: f64,
}

impl PlannedRange {
    /// Track position at which this range ends
    pub fn range_end(&self, chunk_start: f64) -> f64 {
        chunk_start + self.offset + self.duration
    }
}

/// Ranges shorter than this are not worth a playback instance
const MIN_RANGE_SECS: f64 = 1e-6;

/// Plan the part of a chunk that still has to sound
///
/// `chunk_start`/`chunk_end` are the chunk's track bounds, already clipped to
/// the length of its decoded buffer. Returns None when nothing of the chunk
/// lies between the anchor/floor and the end bound, or when its whole range
/// is already in the past.
pub fn plan_chunk(chunk_start: f64, chunk_end: f64, ctx: &ScheduleContext) -> Option<PlannedRange> {
    let range_start = chunk_start.max(ctx.anchor.position).max(ctx.floor);
    let range_end = chunk_end.min(ctx.end);
    if range_end - range_start < MIN_RANGE_SECS {
        return None;
    }

    let mut start_at = ctx.anchor.clock_time_of(range_start, ctx.rate);
    let mut offset = range_start - chunk_start;
    let mut duration = range_end - range_start;

    if start_at < ctx.now {
        // Late: drop what should already have sounded
        let skipped = (ctx.now - start_at) * ctx.rate;
        if skipped >= duration - MIN_RANGE_SECS {
            return None;
        }
        offset += skipped;
        duration -= skipped;
        start_at = ctx.now;
    }

    Some(PlannedRange {
        start_at,
        offset,
        duration,
    })
}
