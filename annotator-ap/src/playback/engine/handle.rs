//! Engine handle and actor loop
//!
//! `PlaybackEngine` is a cheap, cloneable handle. Control calls travel to the
//! actor task as [`EngineMessage`]s and resolve once the actor has updated
//! and published the transport state, so a read right after `seek().await`
//! sees the new position. Queries read the published snapshot and never
//! wait on the actor.

use crate::audio::clock::AudioClock;
use crate::audio::output::{EndedNotifier, PlaybackSink};
use crate::config::{EngineConfig, EngineListeners};
use crate::error::{Error, Result};
use crate::playback::chunk::Track;
use crate::playback::engine::core::{EngineCore, EnginePorts};
use crate::playback::events::{ControlCommand, EngineMessage};
use crate::playback::loader::{ChunkLoader, TaskDispatcher};
use crate::playback::transport::{TransportSnapshot, AVAILABLE_RATES};
use crate::state::SharedState;
use annotator_common::events::AnnotatorEvent;
use annotator_common::PlaybackStatus;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

/// Handle to a running playback engine
#[derive(Clone)]
pub struct PlaybackEngine {
    mailbox: mpsc::UnboundedSender<EngineMessage>,
    state: Arc<SharedState>,
    clock: Arc<dyn AudioClock>,
    track: Track,
}

impl PlaybackEngine {
    /// Validate the configuration and spawn the engine actor
    ///
    /// Must be called inside a tokio runtime. The actor stops on
    /// [`shutdown`](Self::shutdown) or once every handle has been dropped.
    pub fn start(
        track: Track,
        config: EngineConfig,
        clock: Arc<dyn AudioClock>,
        sink: Box<dyn PlaybackSink>,
        loader: Arc<dyn ChunkLoader>,
        listeners: EngineListeners,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(SharedState::new(track.duration()));

        let weak = tx.downgrade();
        let ended = EndedNotifier::new(move |id| {
            if let Some(tx) = weak.upgrade() {
                let _ = tx.send(EngineMessage::PlaybackEnded { id });
            }
        });

        let ports = EnginePorts {
            clock: Arc::clone(&clock),
            sink,
            dispatcher: Box::new(TaskDispatcher::new(loader, tx.downgrade())),
            ended,
        };
        let core = EngineCore::new(track.clone(), config, ports, listeners, Arc::clone(&state))?;

        tokio::spawn(run_actor(core, rx));
        info!("Playback engine started");

        Ok(Self {
            mailbox: tx,
            state,
            clock,
            track,
        })
    }

    /// Play from `start` until `end`
    ///
    /// Invalid bounds fall back to the current position and the track end.
    pub async fn play(&self, start: Option<f64>, end: Option<f64>) -> Result<()> {
        self.request(ControlCommand::Play { start, end }).await
    }

    /// Pause at the current position; no-op when not playing
    pub async fn pause(&self) -> Result<()> {
        self.request(ControlCommand::Pause).await
    }

    /// Move to `position` (clamped to the track); keeps playing if playing
    pub async fn seek(&self, position: f64) -> Result<()> {
        self.request(ControlCommand::Seek { position }).await
    }

    /// Change the playback rate, restarting from the current position if playing
    pub async fn set_rate(&self, rate: f64) -> Result<()> {
        self.request(ControlCommand::SetRate { rate }).await
    }

    /// Pause when playing, play otherwise
    pub async fn play_pause(&self) -> Result<()> {
        self.request(ControlCommand::PlayPause).await
    }

    /// Stop the actor and release every chunk
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.mailbox
            .send(EngineMessage::Shutdown { reply })
            .map_err(|_| Error::EngineStopped)?;
        rx.await.map_err(|_| Error::EngineStopped)
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state.snapshot().status
    }

    pub fn is_loading(&self) -> bool {
        self.state.snapshot().is_loading()
    }

    pub fn is_playing(&self) -> bool {
        self.state.snapshot().is_playing()
    }

    pub fn current_playback_rate(&self) -> f64 {
        self.state.snapshot().rate
    }

    /// Current position in seconds, derived from the clock while playing
    pub fn position(&self) -> f64 {
        self.state.snapshot().position_at(self.clock.now())
    }

    pub fn snapshot(&self) -> TransportSnapshot {
        self.state.snapshot()
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Rates offered to rate selectors
    pub fn available_rates(&self) -> &'static [f64] {
        &AVAILABLE_RATES
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AnnotatorEvent> {
        self.state.subscribe_events()
    }

    /// Wait until a published snapshot satisfies `predicate`
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&TransportSnapshot) -> bool,
    ) -> Result<TransportSnapshot> {
        let mut rx = self.state.watch_snapshot();
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if predicate(&snapshot) {
                    return Ok(snapshot.clone());
                }
            }
            rx.changed().await.map_err(|_| Error::EngineStopped)?;
        }
    }

    async fn request(&self, command: ControlCommand) -> Result<()> {
        debug!("Control request: {:?}", command);
        let (reply, rx) = oneshot::channel();
        self.mailbox
            .send(EngineMessage::Control { command, reply })
            .map_err(|_| Error::EngineStopped)?;
        rx.await.map_err(|_| Error::EngineStopped)?
    }
}

/// Actor loop: one message or timer tick at a time
async fn run_actor(mut core: EngineCore, mut mailbox: mpsc::UnboundedReceiver<EngineMessage>) {
    let mut timer: Option<Interval> = None;
    let mut timer_epoch = 0;

    loop {
        sync_timer(&core, &mut timer, &mut timer_epoch);

        tokio::select! {
            message = mailbox.recv() => match message {
                Some(EngineMessage::Control { command, reply }) => {
                    let result = core.apply(command);
                    let _ = reply.send(result);
                }
                Some(EngineMessage::ChunkLoaded { idx, result }) => core.on_chunk_loaded(idx, result),
                Some(EngineMessage::PlaybackEnded { id }) => core.on_playback_ended(id),
                Some(EngineMessage::Shutdown { reply }) => {
                    core.teardown();
                    let _ = reply.send(());
                    break;
                }
                None => {
                    core.teardown();
                    break;
                }
            },
            _ = next_tick(&mut timer) => core.on_listen_tick(),
        }
    }

    info!("Playback engine stopped");
}

/// Keep at most one listen timer, matching the reporter's state
fn sync_timer(core: &EngineCore, timer: &mut Option<Interval>, timer_epoch: &mut u64) {
    let reporter = core.reporter();
    if !reporter.is_active() {
        *timer = None;
        return;
    }
    if timer.is_some() && *timer_epoch == reporter.epoch() {
        return;
    }

    let period = reporter.interval();
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    *timer = Some(interval);
    *timer_epoch = reporter.epoch();
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
