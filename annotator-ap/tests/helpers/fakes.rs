//! Fake engine collaborators
//!
//! `RecordingSink` stands in for the output device: it remembers every
//! playback instance and lets a test decide when one has finished.

use annotator_ap::audio::{EndedNotifier, PcmBuffer, PlaybackId, PlaybackSink, ScheduledPlayback};
use annotator_ap::playback::{ChunkLoader, LoadDispatcher};
use annotator_ap::{Error, Result, Track};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct SinkLog {
    active: BTreeMap<PlaybackId, (ScheduledPlayback, Option<EndedNotifier>)>,
    started: Vec<ScheduledPlayback>,
    stopped: Vec<PlaybackId>,
}

/// Playback sink recording starts and stops
#[derive(Clone, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<SinkLog>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instances started and neither stopped nor finished, in chunk order
    pub fn active(&self) -> Vec<ScheduledPlayback> {
        let log = self.log.lock().unwrap();
        let mut active: Vec<_> = log.active.values().map(|(p, _)| p.clone()).collect();
        active.sort_by_key(|p| p.chunk);
        active
    }

    pub fn active_for_chunk(&self, chunk: usize) -> Option<ScheduledPlayback> {
        self.active().into_iter().find(|p| p.chunk == chunk)
    }

    /// Every instance ever started, in start order
    pub fn started(&self) -> Vec<ScheduledPlayback> {
        self.log.lock().unwrap().started.clone()
    }

    pub fn stopped(&self) -> Vec<PlaybackId> {
        self.log.lock().unwrap().stopped.clone()
    }

    /// Mark the active instance of `chunk` as finished and fire its notifier
    pub fn finish_chunk(&self, chunk: usize) -> Option<PlaybackId> {
        let (playback, notifier) = {
            let mut log = self.log.lock().unwrap();
            let id = log
                .active
                .iter()
                .find(|(_, (p, _))| p.chunk == chunk)
                .map(|(id, _)| *id)?;
            log.active.remove(&id)?
        };

        if let Some(notifier) = notifier {
            notifier.notify(playback.id);
        }
        Some(playback.id)
    }
}

impl PlaybackSink for RecordingSink {
    fn start(&mut self, playback: ScheduledPlayback, on_ended: Option<EndedNotifier>) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.started.push(playback.clone());
        log.active.insert(playback.id, (playback, on_ended));
        Ok(())
    }

    fn stop(&mut self, id: PlaybackId) {
        let mut log = self.log.lock().unwrap();
        if log.active.remove(&id).is_some() {
            log.stopped.push(id);
        }
    }
}

/// Dispatcher that only records which chunks were requested
#[derive(Clone, Default)]
pub struct ScriptedDispatcher {
    requests: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<usize> {
        self.requests.lock().unwrap().clone()
    }
}

impl LoadDispatcher for ScriptedDispatcher {
    fn dispatch(&mut self, idx: usize) {
        self.requests.lock().unwrap().push(idx);
    }
}

/// Silent mono PCM of the exact length of chunk `idx`
pub fn chunk_pcm(track: &Track, idx: usize) -> PcmBuffer {
    PcmBuffer::silence(track.num_samples(idx), track.sample_rate(), 1)
}

/// Loader resolving immediately with silent PCM, or a network error for
/// chunks listed as failing
#[derive(Clone)]
pub struct InstantLoader {
    track: Track,
    failing: Arc<HashSet<usize>>,
    requests: Arc<Mutex<Vec<usize>>>,
}

impl InstantLoader {
    pub fn new(track: Track) -> Self {
        Self::failing(track, [])
    }

    pub fn failing(track: Track, failing: impl IntoIterator<Item = usize>) -> Self {
        Self {
            track,
            failing: Arc::new(failing.into_iter().collect()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<usize> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChunkLoader for InstantLoader {
    fn load(&self, idx: usize) -> BoxFuture<'static, Result<PcmBuffer>> {
        self.requests.lock().unwrap().push(idx);
        let result = if self.failing.contains(&idx) {
            Err(Error::Network(format!("GET chunk {} returned 503 Service Unavailable", idx)))
        } else {
            Ok(chunk_pcm(&self.track, idx))
        };
        futures::future::ready(result).boxed()
    }
}
