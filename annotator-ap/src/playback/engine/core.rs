//! Engine core - transport state machine and orchestration
//!
//! **Responsibilities:**
//! - Control requests (play, pause, seek, set_rate, play_pause)
//! - Window reconciliation: eviction, load dispatch, loading status
//! - Scheduling resident chunks against the playback anchor
//! - Load completions, ended notifications and listen ticks
//!
//! `EngineCore` is synchronous and owned by exactly one task. Every input is
//! a method call that runs to completion; nothing here blocks or awaits.

use crate::audio::clock::AudioClock;
use crate::audio::output::{EndedNotifier, PlaybackId, PlaybackSink, ScheduledPlayback};
use crate::audio::types::PcmBuffer;
use crate::config::{EngineConfig, EngineListeners};
use crate::error::{Error, Result};
use crate::playback::chunk::Track;
use crate::playback::chunk_store::ChunkStore;
use crate::playback::events::ControlCommand;
use crate::playback::loader::LoadDispatcher;
use crate::playback::reporter::PositionReporter;
use crate::playback::scheduler::{plan_chunk, Anchor, ScheduleContext};
use crate::playback::transport::{Transport, TransportSnapshot};
use crate::playback::window::WindowManager;
use crate::state::SharedState;
use annotator_common::events::AnnotatorEvent;
use annotator_common::PlaybackStatus;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Positions this close to the end bound count as reaching it
const END_EPSILON: f64 = 1e-6;

/// Collaborators the core drives
pub struct EnginePorts {
    pub clock: Arc<dyn AudioClock>,
    pub sink: Box<dyn PlaybackSink>,
    pub dispatcher: Box<dyn LoadDispatcher>,
    /// Attached to every scheduled playback instance
    pub ended: EndedNotifier,
}

/// Transport state machine plus the components it orchestrates
pub struct EngineCore {
    track: Track,
    config: EngineConfig,
    clock: Arc<dyn AudioClock>,
    store: ChunkStore,
    window: WindowManager,
    transport: Transport,
    reporter: PositionReporter,
    dispatcher: Box<dyn LoadDispatcher>,
    ended: EndedNotifier,
    listeners: EngineListeners,
    state: Arc<SharedState>,
    next_playback_id: u64,
    last_status: PlaybackStatus,
    stopped: bool,
}

impl EngineCore {
    /// Build a core for `track`
    ///
    /// # Errors
    /// `Error::Config` if the configuration is invalid or its chunk duration
    /// disagrees with the track's.
    pub fn new(
        track: Track,
        config: EngineConfig,
        ports: EnginePorts,
        listeners: EngineListeners,
        state: Arc<SharedState>,
    ) -> Result<Self> {
        config.validate()?;
        if (config.chunk_duration_secs - track.chunk_duration()).abs() > f64::EPSILON {
            return Err(Error::Config(format!(
                "Track chunk duration {}s does not match engine chunk duration {}s",
                track.chunk_duration(),
                config.chunk_duration_secs
            )));
        }

        let transport = Transport::new(track.duration());
        let last_status = transport.status();

        info!(
            "Engine core ready: {:.3}s track, {} chunks of {}s, window {}",
            track.duration(),
            track.chunk_count(),
            track.chunk_duration(),
            config.window_size
        );

        Ok(Self {
            window: WindowManager::new(config.window_size),
            reporter: PositionReporter::new(config.listen_interval()),
            store: ChunkStore::new(ports.sink),
            clock: ports.clock,
            dispatcher: ports.dispatcher,
            ended: ports.ended,
            track,
            config,
            transport,
            listeners,
            state,
            next_playback_id: 0,
            last_status,
            stopped: false,
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn status(&self) -> PlaybackStatus {
        self.transport.status()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn is_loading(&self) -> bool {
        self.transport.is_loading()
    }

    pub fn rate(&self) -> f64 {
        self.transport.rate()
    }

    /// Current position, derived from the clock while playing
    pub fn position(&self) -> f64 {
        self.transport.position(self.now())
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn reporter(&self) -> &PositionReporter {
        &self.reporter
    }

    /// Whether a load for `idx` is outstanding
    pub fn is_in_flight(&self, idx: usize) -> bool {
        self.window.is_in_flight(idx)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        TransportSnapshot::from_transport(&self.transport, self.track.duration(), self.store.indices())
    }

    // ------------------------------------------------------------------
    // Control requests
    // ------------------------------------------------------------------

    /// Apply one control request and publish the resulting state
    pub fn apply(&mut self, command: ControlCommand) -> Result<()> {
        if self.stopped {
            return Err(Error::EngineStopped);
        }

        let result = match command {
            ControlCommand::Play { start, end } => {
                self.play(start, end);
                Ok(())
            }
            ControlCommand::Pause => {
                self.pause();
                Ok(())
            }
            ControlCommand::Seek { position } => self.seek(position),
            ControlCommand::SetRate { rate } => self.set_rate(rate),
            ControlCommand::PlayPause => {
                self.play_pause();
                Ok(())
            }
        };

        self.after_step();
        result
    }

    fn play(&mut self, start: Option<f64>, end: Option<f64>) {
        let now = self.now();
        let current = self.transport.position(now);
        let (start, end) = self.transport.sanitize_bounds(start, end, current);
        info!("Play from {:.3}s to {:.3}s", start, end);

        if self.transport.wants_play() {
            self.store.unschedule_all();
        }
        self.transport.begin(start, end);
        self.reconcile();
    }

    fn pause(&mut self) {
        if !self.transport.wants_play() {
            debug!("Pause ignored: not playing");
            return;
        }

        let position = self.transport.position(self.now());
        self.store.unschedule_all();
        self.transport.halt(position);
        info!("Paused at {:.3}s", position);
    }

    fn seek(&mut self, position: f64) -> Result<()> {
        let target = self.transport.clamp_position(position)?;
        info!("Seek to {:.3}s", target);

        if self.transport.wants_play() {
            let end = self
                .transport
                .sanitize_end(target, self.transport.target_end());
            self.store.unschedule_all();
            self.transport.begin(target, end);
        } else {
            self.transport.set_position(target);
        }

        self.reconcile();
        Ok(())
    }

    fn set_rate(&mut self, rate: f64) -> Result<()> {
        Transport::validate_rate(rate)?;
        info!("Playback rate {} -> {}", self.transport.rate(), rate);

        if self.transport.anchor().is_some() {
            // Running instances keep their rate: restart from the derived position
            let position = self.transport.position(self.now());
            let end = self.transport.effective_end();
            self.store.unschedule_all();
            self.transport.set_rate(rate)?;
            self.transport.begin(position, end);
            self.reconcile();
        } else {
            self.transport.set_rate(rate)?;
        }

        self.emit(AnnotatorEvent::RateChanged {
            rate,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn play_pause(&mut self) {
        if self.transport.wants_play() {
            self.pause();
        } else {
            self.play(None, None);
        }
    }

    // ------------------------------------------------------------------
    // Asynchronous completions
    // ------------------------------------------------------------------

    /// A dispatched load finished
    pub fn on_chunk_loaded(&mut self, idx: usize, result: Result<PcmBuffer>) {
        if self.stopped {
            return;
        }
        if !self.window.complete(idx) {
            debug!("Discarding stale load of chunk {}", idx);
            return;
        }

        let position = self.transport.position(self.now());
        let in_window = self
            .window
            .target(&self.track, position)
            .is_some_and(|window| window.contains(idx));

        match result {
            Ok(buffer) if in_window && !self.store.has(idx) => {
                debug!(
                    "Chunk {} resident ({} frames, {:.3}s)",
                    idx,
                    buffer.frames,
                    buffer.duration_secs()
                );
                self.store.put(idx, Arc::new(buffer));
                self.emit(AnnotatorEvent::ChunkLoaded {
                    index: idx,
                    timestamp: Utc::now(),
                });
            }
            Ok(_) => {
                debug!("Discarding chunk {} loaded outside the window", idx);
            }
            Err(e) => {
                if e.is_load_failure() {
                    warn!("Failed to load chunk {}: {}", idx, e);
                } else {
                    error!("Unexpected error loading chunk {}: {}", idx, e);
                }
                if in_window {
                    self.window.mark_failed(idx);
                }
                let message = format!("Error during audio data decoding of chunk {}: {}", idx, e);
                (self.listeners.on_error)(message.clone());
                self.emit(AnnotatorEvent::LoadFailed {
                    index: idx,
                    message,
                    timestamp: Utc::now(),
                });
            }
        }

        self.reconcile();
        self.after_step();
    }

    /// A playback instance rendered its whole range
    pub fn on_playback_ended(&mut self, id: PlaybackId) {
        if self.stopped {
            return;
        }
        let Some((idx, playback)) = self.store.release_finished(id) else {
            debug!("Ignoring ended notification for retired {}", id);
            return;
        };

        let range_end = self.track.chunk_start(idx) + playback.offset + playback.duration;
        debug!("Chunk {} finished at {:.3}s", idx, range_end);

        if range_end >= self.transport.effective_end() - END_EPSILON {
            self.finish();
        } else {
            self.transport.note_played(range_end);
        }

        self.reconcile();
        self.after_step();
    }

    /// Listen timer fired
    pub fn on_listen_tick(&mut self) {
        if self.stopped || !self.transport.is_playing() {
            return;
        }

        let position = self.transport.position(self.now());
        let end = self.transport.effective_end();
        let reported = position.min(end);

        (self.listeners.on_listen)(reported);
        self.emit(AnnotatorEvent::PositionUpdate {
            position_secs: reported,
            timestamp: Utc::now(),
        });

        if position >= end - END_EPSILON {
            self.finish();
        }
        self.after_step();
    }

    /// Stop everything; later inputs are ignored
    pub fn teardown(&mut self) {
        if self.stopped {
            return;
        }

        if self.transport.wants_play() {
            let position = self.transport.position(self.now());
            self.transport.halt(position);
        }
        self.reporter.deactivate();
        self.store.clear();
        self.window.clear();
        self.transport.set_loading(false);
        self.after_step();
        self.stopped = true;

        info!("Engine core torn down");
    }

    // ------------------------------------------------------------------
    // Window reconciliation and scheduling
    // ------------------------------------------------------------------

    /// Bring residency, loading status and scheduling in line with the
    /// current position
    fn reconcile(&mut self) {
        let now = self.now();
        if self.transport.wants_play()
            && self.transport.position(now) >= self.transport.effective_end() - END_EPSILON
        {
            self.finish();
        }

        let position = self.transport.position(now);
        let Some(window) = self.window.target(&self.track, position) else {
            debug!("Position {:.3}s outside the track, nothing to reconcile", position);
            return;
        };

        for idx in self.window.evictions(&window, &self.store.indices()) {
            self.store.remove(idx);
            debug!("Evicted chunk {}", idx);
            self.emit(AnnotatorEvent::ChunkEvicted {
                index: idx,
                timestamp: Utc::now(),
            });
        }
        self.window.forget_failures_outside(&window);

        let current = window.current();
        if self.store.has(current) {
            self.transport.set_loading(false);
            if self.transport.wants_play() {
                if self.transport.anchor().is_none() {
                    let anchor = Anchor::new(
                        now + self.config.start_gap_secs(),
                        self.transport.logical_position(),
                    );
                    debug!(
                        "Anchoring {:.3}s at clock {:.3}s",
                        anchor.position, anchor.clock_time
                    );
                    self.transport.set_anchor(anchor);
                }
                self.schedule_all(now);
            }
        } else if self.transport.anchor().is_some() {
            warn!("Chunk {} not ready at {:.3}s, waiting", current, position);
            self.store.unschedule_all();
            self.transport.stall(position);
        } else {
            self.transport.set_loading(true);
        }

        if let Some(idx) = self.window.next_load(&window, |idx| self.store.has(idx)) {
            debug!("Loading chunk {}", idx);
            self.window.mark_in_flight(idx);
            self.dispatcher.dispatch(idx);
        }
    }

    /// Schedule every resident, unscheduled chunk against the anchor
    fn schedule_all(&mut self, now: f64) {
        let Some(anchor) = self.transport.anchor() else {
            return;
        };
        let rate = self.transport.rate();
        let ctx = ScheduleContext {
            anchor,
            rate,
            floor: self.transport.floor(),
            end: self.transport.effective_end(),
            now,
        };

        for idx in self.store.unscheduled_indices() {
            let Some(buffer) = self.store.get(idx).map(|chunk| Arc::clone(chunk.buffer())) else {
                continue;
            };
            let chunk_start = self.track.chunk_start(idx);
            let chunk_end = self
                .track
                .chunk_end(idx)
                .min(chunk_start + buffer.duration_secs());

            let Some(range) = plan_chunk(chunk_start, chunk_end, &ctx) else {
                continue;
            };

            let playback = ScheduledPlayback {
                id: self.allocate_playback_id(),
                chunk: idx,
                buffer,
                rate,
                start_at: range.start_at,
                offset: range.offset,
                duration: range.duration,
            };
            if let Err(e) = self.store.schedule(idx, playback, Some(self.ended.clone())) {
                error!("Failed to schedule chunk {}: {}", idx, e);
            }
        }
    }

    /// Pause at the end bound
    fn finish(&mut self) {
        let end = self.transport.effective_end();
        self.store.unschedule_all();
        self.transport.halt(end);
        info!("Reached end of play range at {:.3}s", end);
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn allocate_playback_id(&mut self) -> PlaybackId {
        self.next_playback_id += 1;
        PlaybackId(self.next_playback_id)
    }

    fn emit(&self, event: AnnotatorEvent) {
        self.state.broadcast_event(event);
    }

    /// Keep the reporter in step with the status and publish state
    fn after_step(&mut self) {
        if self.transport.is_playing() {
            self.reporter.activate();
        } else {
            self.reporter.deactivate();
        }

        let status = self.transport.status();
        if status != self.last_status {
            info!("Status {} -> {}", self.last_status, status);
            self.emit(AnnotatorEvent::StatusChanged {
                old_status: self.last_status,
                new_status: status,
                timestamp: Utc::now(),
            });
            self.last_status = status;
        }

        self.state.publish_snapshot(self.snapshot());
    }
}
