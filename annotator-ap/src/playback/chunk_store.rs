//! Chunk Store
//!
//! Arena of resident chunks keyed by chunk index. The store owns the
//! playback sink so that a chunk can never be dropped while its playback
//! instance is still registered: removal always unschedules first.
//!
//! A chunk is scheduled iff it holds a [`ScheduledPlayback`]; the id in that
//! descriptor is the only live handle to the instance.

use crate::audio::output::{EndedNotifier, PlaybackId, PlaybackSink, ScheduledPlayback};
use crate::audio::types::PcmBuffer;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One resident chunk
#[derive(Debug)]
pub struct Chunk {
    buffer: Arc<PcmBuffer>,
    scheduled: Option<ScheduledPlayback>,
}

impl Chunk {
    pub fn buffer(&self) -> &Arc<PcmBuffer> {
        &self.buffer
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled.is_some()
    }

    /// Descriptor of the live playback instance, if scheduled
    pub fn scheduled(&self) -> Option<&ScheduledPlayback> {
        self.scheduled.as_ref()
    }
}

/// Resident chunks plus the sink their playback instances run on
pub struct ChunkStore {
    chunks: BTreeMap<usize, Chunk>,
    sink: Box<dyn PlaybackSink>,
}

impl ChunkStore {
    pub fn new(sink: Box<dyn PlaybackSink>) -> Self {
        Self {
            chunks: BTreeMap::new(),
            sink,
        }
    }

    pub fn has(&self, idx: usize) -> bool {
        self.chunks.contains_key(&idx)
    }

    pub fn get(&self, idx: usize) -> Option<&Chunk> {
        self.chunks.get(&idx)
    }

    /// Insert a decoded chunk, unscheduled
    ///
    /// Replacing an existing chunk unschedules it first.
    pub fn put(&mut self, idx: usize, buffer: Arc<PcmBuffer>) {
        if self.has(idx) {
            warn!("Replacing resident chunk {}", idx);
            self.unschedule(idx);
        }
        self.chunks.insert(
            idx,
            Chunk {
                buffer,
                scheduled: None,
            },
        );
    }

    /// Unschedule then drop a chunk; returns whether it was resident
    pub fn remove(&mut self, idx: usize) -> bool {
        self.unschedule(idx);
        self.chunks.remove(&idx).is_some()
    }

    /// Resident indices in ascending order
    pub fn indices(&self) -> Vec<usize> {
        self.chunks.keys().copied().collect()
    }

    /// Resident indices without a live playback instance
    pub fn unscheduled_indices(&self) -> Vec<usize> {
        self.chunks
            .iter()
            .filter(|(_, chunk)| !chunk.is_scheduled())
            .map(|(idx, _)| *idx)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Hand a playback instance for chunk `idx` to the sink
    ///
    /// The chunk is marked scheduled only if the sink accepted the instance.
    pub fn schedule(
        &mut self,
        idx: usize,
        playback: ScheduledPlayback,
        on_ended: Option<EndedNotifier>,
    ) -> Result<()> {
        let chunk = self
            .chunks
            .get_mut(&idx)
            .ok_or_else(|| Error::InvalidInput(format!("Chunk {} is not resident", idx)))?;
        if let Some(existing) = chunk.scheduled.as_ref() {
            return Err(Error::InvalidInput(format!(
                "Chunk {} already scheduled as {}",
                idx, existing.id
            )));
        }

        self.sink.start(playback.clone(), on_ended)?;
        debug!(
            "Scheduled chunk {} as {} at {:.3}s (offset {:.3}s, {:.3}s)",
            idx, playback.id, playback.start_at, playback.offset, playback.duration
        );
        chunk.scheduled = Some(playback);
        Ok(())
    }

    /// Stop chunk `idx`'s playback instance if it has one
    ///
    /// The instance is unregistered before the sink is told to stop it, so a
    /// late ended notification no longer resolves to this chunk.
    pub fn unschedule(&mut self, idx: usize) -> bool {
        let Some(playback) = self.chunks.get_mut(&idx).and_then(|c| c.scheduled.take()) else {
            return false;
        };
        self.sink.stop(playback.id);
        debug!("Unscheduled chunk {} ({})", idx, playback.id);
        true
    }

    /// Unschedule every chunk
    pub fn unschedule_all(&mut self) -> usize {
        let scheduled: Vec<usize> = self
            .chunks
            .iter()
            .filter(|(_, chunk)| chunk.is_scheduled())
            .map(|(idx, _)| *idx)
            .collect();
        for idx in &scheduled {
            self.unschedule(*idx);
        }
        scheduled.len()
    }

    /// Chunk currently registered under `id`
    pub fn find_playback(&self, id: PlaybackId) -> Option<(usize, &ScheduledPlayback)> {
        self.chunks.iter().find_map(|(idx, chunk)| {
            chunk
                .scheduled
                .as_ref()
                .filter(|playback| playback.id == id)
                .map(|playback| (*idx, playback))
        })
    }

    /// Forget a playback instance that finished on its own
    ///
    /// The sink already dropped it, so no stop is issued.
    pub fn release_finished(&mut self, id: PlaybackId) -> Option<(usize, ScheduledPlayback)> {
        let (idx, chunk) = self.chunks.iter_mut().find(|(_, chunk)| {
            chunk
                .scheduled
                .as_ref()
                .is_some_and(|playback| playback.id == id)
        })?;
        chunk.scheduled.take().map(|playback| (*idx, playback))
    }

    /// Unschedule and drop every chunk
    pub fn clear(&mut self) {
        for idx in self.indices() {
            self.remove(idx);
        }
    }
}

impl Drop for ChunkStore {
    fn drop(&mut self) {
        self.unschedule_all();
    }
}
