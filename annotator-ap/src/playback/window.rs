//! Window Manager bookkeeping
//!
//! Computes the target window `{cur, cur + 1, .., min(cur + K - 1, max_idx)}`
//! and tracks in-flight and failed loads separately from resident chunks.
//! Applying the plan to the Chunk Store happens in the engine core.

use crate::playback::chunk::Track;
use std::collections::BTreeSet;
use std::ops::RangeInclusive;

/// Indices that should be resident for a position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    first: usize,
    last: usize,
}

impl Window {
    /// Chunk containing the position
    pub fn current(&self) -> usize {
        self.first
    }

    pub fn contains(&self, idx: usize) -> bool {
        (self.first..=self.last).contains(&idx)
    }

    pub fn indices(&self) -> RangeInclusive<usize> {
        self.first..=self.last
    }
}

/// Load bookkeeping for the window
#[derive(Debug)]
pub struct WindowManager {
    size: usize,
    in_flight: BTreeSet<usize>,
    failed: BTreeSet<usize>,
}

impl WindowManager {
    /// `size` is K, the number of chunks kept resident
    pub fn new(size: usize) -> Self {
        Self {
            size: size.max(1),
            in_flight: BTreeSet::new(),
            failed: BTreeSet::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Target window at `position`, None when out of range
    pub fn target(&self, track: &Track, position: f64) -> Option<Window> {
        let first = track.chunk_index_of(position)?;
        let last = first.saturating_add(self.size - 1).min(track.max_idx());
        Some(Window { first, last })
    }

    /// Next index to load, lowest first
    ///
    /// Only one load inside the window is outstanding at a time; failed
    /// indices are skipped until they leave the window.
    pub fn next_load(&self, window: &Window, is_resident: impl Fn(usize) -> bool) -> Option<usize> {
        if self.in_flight.iter().any(|idx| window.contains(*idx)) {
            return None;
        }
        window
            .indices()
            .find(|idx| !is_resident(*idx) && !self.failed.contains(idx))
    }

    pub fn mark_in_flight(&mut self, idx: usize) {
        self.in_flight.insert(idx);
    }

    pub fn is_in_flight(&self, idx: usize) -> bool {
        self.in_flight.contains(&idx)
    }

    /// Record that a load finished; false if it was not outstanding
    pub fn complete(&mut self, idx: usize) -> bool {
        self.in_flight.remove(&idx)
    }

    pub fn mark_failed(&mut self, idx: usize) {
        self.failed.insert(idx);
    }

    pub fn has_failed(&self, idx: usize) -> bool {
        self.failed.contains(&idx)
    }

    /// Make failed indices outside `window` eligible for a retry
    pub fn forget_failures_outside(&mut self, window: &Window) {
        self.failed.retain(|idx| window.contains(*idx));
    }

    /// Resident indices that fall outside `window`
    pub fn evictions(&self, window: &Window, resident: &[usize]) -> Vec<usize> {
        resident
            .iter()
            .copied()
            .filter(|idx| !window.contains(*idx))
            .collect()
    }

    /// Forget all outstanding and failed loads
    pub fn clear(&mut self) {
        self.in_flight.clear();
        self.failed.clear();
    }
}
