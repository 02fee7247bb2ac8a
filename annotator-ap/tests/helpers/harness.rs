//! Engine core wired to fakes
//!
//! Drives `EngineCore` synchronously: the test plays the part of the actor
//! and decides when loads complete, when instances finish and when the clock
//! moves.

use super::fakes::{chunk_pcm, RecordingSink, ScriptedDispatcher};
use annotator_ap::audio::{EndedNotifier, ManualClock, PlaybackId};
use annotator_ap::playback::{ControlCommand, EngineCore, EnginePorts};
use annotator_ap::{EngineConfig, EngineListeners, Error, Result, SharedState, Track};
use annotator_common::events::AnnotatorEvent;
use annotator_common::PlaybackStatus;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Low sample rate keeps minute-long fixture chunks small
pub const TEST_SAMPLE_RATE: u32 = 100;

/// Track of `duration` seconds in 60 second chunks
pub fn test_track(duration: f64) -> Track {
    Track::new(duration, TEST_SAMPLE_RATE, "http://chunks.test/recording/", 60.0).expect("valid track")
}

pub struct CoreHarness {
    pub core: EngineCore,
    pub track: Track,
    pub sink: RecordingSink,
    pub loads: ScriptedDispatcher,
    pub clock: ManualClock,
    pub state: Arc<SharedState>,
    pub errors: Arc<Mutex<Vec<String>>>,
    pub listens: Arc<Mutex<Vec<f64>>>,
    pub notified: Arc<Mutex<Vec<PlaybackId>>>,
    events: broadcast::Receiver<AnnotatorEvent>,
    served: usize,
}

impl CoreHarness {
    pub fn new(duration: f64) -> Self {
        Self::with_config(duration, EngineConfig::default())
    }

    pub fn with_config(duration: f64, config: EngineConfig) -> Self {
        let track = test_track(duration);
        let sink = RecordingSink::new();
        let loads = ScriptedDispatcher::new();
        let clock = ManualClock::new();
        let state = Arc::new(SharedState::new(track.duration()));
        let events = state.subscribe_events();

        let notified = Arc::new(Mutex::new(Vec::new()));
        let ended = {
            let notified = Arc::clone(&notified);
            EndedNotifier::new(move |id| notified.lock().unwrap().push(id))
        };

        let errors = Arc::new(Mutex::new(Vec::new()));
        let listens = Arc::new(Mutex::new(Vec::new()));
        let listeners = {
            let errors = Arc::clone(&errors);
            let listens = Arc::clone(&listens);
            EngineListeners::default()
                .with_on_error(move |message| errors.lock().unwrap().push(message))
                .with_on_listen(move |position| listens.lock().unwrap().push(position))
        };

        let ports = EnginePorts {
            clock: Arc::new(clock.clone()),
            sink: Box::new(sink.clone()),
            dispatcher: Box::new(loads.clone()),
            ended,
        };
        let core = EngineCore::new(track.clone(), config, ports, listeners, Arc::clone(&state))
            .expect("engine core");

        Self {
            core,
            track,
            sink,
            loads,
            clock,
            state,
            errors,
            listens,
            notified,
            events,
            served: 0,
        }
    }

    pub fn play(&mut self, start: Option<f64>, end: Option<f64>) {
        self.core
            .apply(ControlCommand::Play { start, end })
            .expect("play");
    }

    pub fn pause(&mut self) {
        self.core.apply(ControlCommand::Pause).expect("pause");
    }

    pub fn play_pause(&mut self) {
        self.core.apply(ControlCommand::PlayPause).expect("play_pause");
    }

    pub fn seek(&mut self, position: f64) -> Result<()> {
        self.core.apply(ControlCommand::Seek { position })
    }

    pub fn set_rate(&mut self, rate: f64) -> Result<()> {
        self.core.apply(ControlCommand::SetRate { rate })
    }

    /// Deliver a successful load of chunk `idx`
    pub fn complete(&mut self, idx: usize) {
        let pcm = chunk_pcm(&self.track, idx);
        self.core.on_chunk_loaded(idx, Ok(pcm));
    }

    /// Deliver a failed load of chunk `idx`
    pub fn fail(&mut self, idx: usize) {
        self.core.on_chunk_loaded(
            idx,
            Err(Error::Network(format!("GET chunk {} returned 404 Not Found", idx))),
        );
    }

    /// Complete requested loads in order until the engine stops asking
    pub fn serve_pending(&mut self) -> Vec<usize> {
        let mut served = Vec::new();
        loop {
            let requests = self.loads.requests();
            let Some(&idx) = requests.get(self.served) else {
                return served;
            };
            self.served += 1;
            self.complete(idx);
            served.push(idx);
        }
    }

    /// Let the instance playing `chunk` run out and deliver its notification
    pub fn finish_chunk(&mut self, chunk: usize) -> PlaybackId {
        let id = self
            .sink
            .finish_chunk(chunk)
            .unwrap_or_else(|| panic!("chunk {} has no active playback", chunk));
        self.core.on_playback_ended(id);
        id
    }

    pub fn resident(&self) -> Vec<usize> {
        self.core.store().indices()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.core.status()
    }

    pub fn position(&self) -> f64 {
        self.core.position()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn listens(&self) -> Vec<f64> {
        self.listens.lock().unwrap().clone()
    }

    /// Events broadcast since the last drain
    pub fn drain_events(&mut self) -> Vec<AnnotatorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
