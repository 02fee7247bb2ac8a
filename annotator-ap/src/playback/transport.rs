//! Transport state
//!
//! Holds the settled play intent (idle / paused / playing), the loading
//! flag, logical position, play bound, rate and anchor. The reported status
//! is `Loading` whenever the flag is set, otherwise the intent.
//!
//! The anchor exists only while the status is `Playing`.

use crate::error::{Error, Result};
use crate::playback::scheduler::Anchor;
use annotator_common::PlaybackStatus;
use serde::Serialize;

/// Rates offered to UI rate selectors
pub const AVAILABLE_RATES: [f64; 8] = [0.25, 0.5, 1.0, 1.5, 2.0, 3.0, 5.0, 10.0];

/// Default playback rate
pub const DEFAULT_RATE: f64 = 1.0;

/// Settled play intent, independent of chunk residency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Idle,
    Paused,
    Playing,
}

#[derive(Debug, Clone)]
pub struct Transport {
    duration: f64,
    intent: Intent,
    loading: bool,
    /// Authoritative position whenever no anchor is set
    position: f64,
    target_end: Option<f64>,
    rate: f64,
    anchor: Option<Anchor>,
    /// Track position already played through in this session
    floor: f64,
}

impl Transport {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            intent: Intent::Idle,
            loading: false,
            position: 0.0,
            target_end: None,
            rate: DEFAULT_RATE,
            anchor: None,
            floor: 0.0,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        if self.loading {
            return PlaybackStatus::Loading;
        }
        match self.intent {
            Intent::Idle => PlaybackStatus::Idle,
            Intent::Paused => PlaybackStatus::Paused,
            Intent::Playing => PlaybackStatus::Playing,
        }
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    /// Playing, or waiting for a chunk with the intent to play
    pub fn wants_play(&self) -> bool {
        self.intent == Intent::Playing
    }

    pub fn is_playing(&self) -> bool {
        self.status() == PlaybackStatus::Playing
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn anchor(&self) -> Option<Anchor> {
        self.anchor
    }

    pub fn target_end(&self) -> Option<f64> {
        self.target_end
    }

    /// Position at which playback stops: the play bound or the track end
    pub fn effective_end(&self) -> f64 {
        self.target_end.unwrap_or(self.duration)
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Logical position without consulting the clock
    pub fn logical_position(&self) -> f64 {
        self.position
    }

    /// Current position: derived from the anchor while playing
    pub fn position(&self, now: f64) -> f64 {
        match self.anchor {
            Some(anchor) => anchor
                .position_at(now, self.rate)
                .max(self.floor)
                .clamp(0.0, self.duration),
            None => self.position,
        }
    }

    /// Resolve requested play bounds
    ///
    /// `start` is used only inside `[0, duration)`, else `current`; `end`
    /// only when `start < end < duration`, else the track end.
    pub fn sanitize_bounds(&self, start: Option<f64>, end: Option<f64>, current: f64) -> (f64, f64) {
        let start = match start {
            Some(s) if s.is_finite() && s >= 0.0 && s < self.duration => s,
            _ => current,
        };
        let end = self.sanitize_end(start, end);
        (start, end)
    }

    /// End bound for a play starting at `start`
    pub fn sanitize_end(&self, start: f64, end: Option<f64>) -> f64 {
        match end {
            Some(e) if e.is_finite() && e > start && e < self.duration => e,
            _ => self.duration,
        }
    }

    /// Clamp a seek target into `[0, duration]`
    pub fn clamp_position(&self, position: f64) -> Result<f64> {
        if !position.is_finite() {
            return Err(Error::InvalidInput(format!("Invalid position: {}", position)));
        }
        Ok(position.clamp(0.0, self.duration))
    }

    /// Enter the play intent at `start`, bounded by `end`; no anchor yet
    pub fn begin(&mut self, start: f64, end: f64) {
        self.intent = Intent::Playing;
        self.position = start.clamp(0.0, self.duration);
        self.target_end = if end < self.duration { Some(end) } else { None };
        self.anchor = None;
        self.floor = self.position;
    }

    /// Stop at `position` with the paused intent
    pub fn halt(&mut self, position: f64) {
        self.intent = Intent::Paused;
        self.position = position.clamp(0.0, self.duration);
        self.anchor = None;
        self.floor = self.position;
    }

    /// Move the logical position without playing
    pub fn set_position(&mut self, position: f64) {
        self.position = position.clamp(0.0, self.duration);
        self.floor = self.position;
    }

    /// Start the clock for the current logical position
    pub fn set_anchor(&mut self, anchor: Anchor) {
        self.anchor = Some(anchor);
        self.position = anchor.position;
        self.floor = anchor.position;
        self.loading = false;
    }

    /// Freeze at `position` waiting for a chunk, keeping the play intent
    pub fn stall(&mut self, position: f64) {
        self.position = position.clamp(0.0, self.duration);
        self.anchor = None;
        self.floor = self.position;
        self.loading = true;
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Record that playback has sounded up to `position`
    pub fn note_played(&mut self, position: f64) {
        if self.anchor.is_some() {
            self.floor = self.floor.max(position.min(self.duration));
        }
    }

    /// Reject non-positive and non-finite rates
    pub fn validate_rate(rate: f64) -> Result<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "Playback rate must be positive, got {}",
                rate
            )));
        }
        Ok(())
    }

    /// Change the rate; caller re-anchors when playing
    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        Self::validate_rate(rate)?;
        self.rate = rate;
        Ok(())
    }
}

/// Read-only view published after every engine step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportSnapshot {
    pub status: PlaybackStatus,
    pub position: f64,
    pub rate: f64,
    pub target_end: Option<f64>,
    pub anchor: Option<Anchor>,
    pub floor: f64,
    pub duration: f64,
    pub resident: Vec<usize>,
}

impl TransportSnapshot {
    pub fn initial(duration: f64) -> Self {
        Self::from_transport(&Transport::new(duration), duration, Vec::new())
    }

    pub fn from_transport(transport: &Transport, duration: f64, resident: Vec<usize>) -> Self {
        Self {
            status: transport.status(),
            position: transport.logical_position(),
            rate: transport.rate(),
            target_end: transport.target_end(),
            anchor: transport.anchor(),
            floor: transport.floor(),
            duration,
            resident,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }

    pub fn is_loading(&self) -> bool {
        self.status == PlaybackStatus::Loading
    }

    /// Position at clock time `now`
    pub fn position_at(&self, now: f64) -> f64 {
        match self.anchor {
            Some(anchor) => anchor
                .position_at(now, self.rate)
                .max(self.floor)
                .clamp(0.0, self.duration),
            None => self.position,
        }
    }
}
