//! Position Reporter
//!
//! Tracks whether the listen timer should run. The actor loop owns the
//! actual `tokio::time::Interval` and rebuilds it whenever the epoch
//! changes, so at most one timer exists at any time.

use std::time::Duration;

#[derive(Debug)]
pub struct PositionReporter {
    interval: Duration,
    active: bool,
    epoch: u64,
}

impl PositionReporter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            active: false,
            epoch: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Bumped every time the timer is started
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Start the timer unless it is already running
    pub fn activate(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        self.epoch += 1;
        true
    }

    /// Stop the timer
    pub fn deactivate(&mut self) -> bool {
        std::mem::replace(&mut self.active, false)
    }
}
