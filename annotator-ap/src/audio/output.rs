//! Audio output using cpal
//!
//! Playback instances are value descriptors ([`ScheduledPlayback`]) handed to
//! a [`PlaybackSink`]. The device sink forwards them to the real-time callback
//! over a lock-free queue, where [`VoiceMixer`] renders them against the
//! device frame counter that also drives [`DeviceClock`].
//!
//! The thread that owns the stream doubles as the forwarder: it flushes
//! commands that did not fit in the queue, runs ended notifiers and drops
//! retired voices, so none of that happens inside the callback.

use crate::audio::clock::DeviceClock;
use crate::audio::types::PcmBuffer;
use crate::audio::voice::{RetiredVoices, Voice, VoiceCommand, VoiceMixer};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Capacity of the engine → callback command queue
const COMMAND_QUEUE_CAPACITY: usize = 256;

/// How often the audio thread forwards retired voices and spilled commands
const FORWARD_INTERVAL: Duration = Duration::from_millis(5);

/// Engine-allocated identifier of one playback instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackId(pub u64);

impl fmt::Display for PlaybackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "playback#{}", self.0)
    }
}

/// Callback fired when a playback instance has rendered its whole range
///
/// Never fired for instances stopped through [`PlaybackSink::stop`]. The
/// device output calls it from its forwarder thread, not the audio callback.
#[derive(Clone)]
pub struct EndedNotifier(Arc<dyn Fn(PlaybackId) + Send + Sync>);

impl EndedNotifier {
    pub fn new(f: impl Fn(PlaybackId) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn notify(&self, id: PlaybackId) {
        (self.0)(id)
    }
}

impl fmt::Debug for EndedNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EndedNotifier")
    }
}

/// One scheduled playback instance
///
/// Recreated on every schedule pass; never mutated once handed to a sink.
#[derive(Debug, Clone)]
pub struct ScheduledPlayback {
    pub id: PlaybackId,
    /// Chunk index the buffer belongs to
    pub chunk: usize,
    pub buffer: Arc<PcmBuffer>,
    /// Playback rate (1.0 = normal speed)
    pub rate: f64,
    /// Clock time (seconds) at which output begins
    pub start_at: f64,
    /// Offset into the buffer in seconds of buffer time
    pub offset: f64,
    /// Length of the played range in seconds of buffer time
    pub duration: f64,
}

impl ScheduledPlayback {
    /// Clock time at which this instance finishes
    pub fn ends_at(&self) -> f64 {
        self.start_at + self.duration / self.rate
    }
}

/// Destination for scheduled playback instances
pub trait PlaybackSink: Send {
    /// Start (or queue for a future clock time) a playback instance
    fn start(&mut self, playback: ScheduledPlayback, on_ended: Option<EndedNotifier>) -> Result<()>;

    /// Stop a playback instance; its ended notifier must not fire afterwards
    fn stop(&mut self, id: PlaybackId);
}

/// Engine side of the command queue
///
/// Commands that find the queue full wait here in order and are pushed
/// before anything newer, so a stop is never lost.
pub struct CommandOutbox {
    producer: HeapProd<VoiceCommand>,
    pending: VecDeque<VoiceCommand>,
}

impl CommandOutbox {
    pub fn new(producer: HeapProd<VoiceCommand>) -> Self {
        Self {
            producer,
            pending: VecDeque::new(),
        }
    }

    /// Queue a command; false if it had to wait behind a full queue
    pub fn send(&mut self, command: VoiceCommand) -> bool {
        self.flush();
        if !self.pending.is_empty() {
            self.pending.push_back(command);
            return false;
        }
        match self.producer.try_push(command) {
            Ok(()) => true,
            Err(command) => {
                self.pending.push_back(command);
                false
            }
        }
    }

    /// Push waiting commands, oldest first; returns how many still wait
    pub fn flush(&mut self) -> usize {
        while let Some(command) = self.pending.pop_front() {
            if let Err(command) = self.producer.try_push(command) {
                self.pending.push_front(command);
                break;
            }
        }
        self.pending.len()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Hardware output device
///
/// The cpal stream lives on a dedicated thread because it is not `Send`.
/// Dropping the `DeviceOutput` closes the stream.
pub struct DeviceOutput {
    outbox: Arc<Mutex<CommandOutbox>>,
    device_rate: u32,
    device_name: String,
    error_flag: Arc<AtomicBool>,
    _shutdown: mpsc::Sender<()>,
}

impl DeviceOutput {
    /// List available audio output devices
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device (None = default) and start its stream
    ///
    /// Returns the sink together with the clock driven by that stream.
    pub fn open(device_name: Option<String>) -> Result<(Self, DeviceClock)> {
        let (producer, consumer) = HeapRb::<VoiceCommand>::new(COMMAND_QUEUE_CAPACITY).split();
        let outbox = Arc::new(Mutex::new(CommandOutbox::new(producer)));
        let frames_rendered = Arc::new(AtomicU64::new(0));
        let error_flag = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(u32, String)>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread_frames = Arc::clone(&frames_rendered);
        let thread_error_flag = Arc::clone(&error_flag);
        let thread_outbox = Arc::clone(&outbox);

        std::thread::Builder::new()
            .name("annotator-audio-out".to_string())
            .spawn(move || {
                let (stream, mut retired) = match build_output(device_name, consumer, thread_frames, thread_error_flag) {
                    Ok((stream, retired, rate, name)) => {
                        let _ = ready_tx.send(Ok((rate, name)));
                        (stream, retired)
                    }
                    Err(e) => {
                        error!("Failed to open audio output: {}", e);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Runs until the DeviceOutput (and its sender) is dropped
                while let Err(RecvTimeoutError::Timeout) = shutdown_rx.recv_timeout(FORWARD_INTERVAL) {
                    retired.dispatch();
                    let waiting = thread_outbox
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .flush();
                    if waiting > 0 {
                        debug!("{} audio commands waiting for queue space", waiting);
                    }
                }

                if let Err(e) = stream.pause() {
                    warn!("Failed to pause stream on shutdown: {}", e);
                }
                drop(stream);
                retired.dispatch();
                info!("Audio output stopped");
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn audio thread: {}", e)))?;

        let (device_rate, device_name) = ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Audio thread exited during startup".to_string()))??;

        info!("Audio output started: {} at {}Hz", device_name, device_rate);

        let clock = DeviceClock::new(frames_rendered, device_rate);
        Ok((
            Self {
                outbox,
                device_rate,
                device_name,
                error_flag,
                _shutdown: shutdown_tx,
            },
            clock,
        ))
    }

    /// Device sample rate
    pub fn sample_rate(&self) -> u32 {
        self.device_rate
    }

    /// Device name
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Whether the stream reported an error
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }

    fn send(&mut self, command: VoiceCommand) -> bool {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(command)
    }
}

impl PlaybackSink for DeviceOutput {
    fn start(&mut self, playback: ScheduledPlayback, on_ended: Option<EndedNotifier>) -> Result<()> {
        if self.has_error() {
            return Err(Error::AudioOutput(format!(
                "Stream on {} failed, not starting {}",
                self.device_name, playback.id
            )));
        }
        let id = playback.id;
        let voice = Voice::new(playback, on_ended, self.device_rate);
        if !self.send(VoiceCommand::Start(Box::new(voice))) {
            warn!("Audio command queue full, {} start deferred", id);
        }
        Ok(())
    }

    fn stop(&mut self, id: PlaybackId) {
        if !self.send(VoiceCommand::Stop(id)) {
            warn!("Audio command queue full, {} stop deferred", id);
        }
    }
}

/// Open the device and start a stream feeding it from a [`VoiceMixer`]
fn build_output(
    device_name: Option<String>,
    commands: HeapCons<VoiceCommand>,
    frames_rendered: Arc<AtomicU64>,
    error_flag: Arc<AtomicBool>,
) -> Result<(Stream, RetiredVoices, u32, String)> {
    let device = select_device(device_name.as_deref())?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported = device
        .default_output_config()
        .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.config();
    let rate = config.sample_rate.0;

    debug!(
        "Audio config: sample_rate={}, channels={}, format={:?}",
        rate, config.channels, sample_format
    );

    let (mixer, retired) = VoiceMixer::new(rate, frames_rendered);
    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, mixer, commands, error_flag)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &config, mixer, commands, error_flag)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &config, mixer, commands, error_flag)?,
        other => {
            return Err(Error::AudioOutput(format!(
                "Unsupported sample format: {:?}",
                other
            )));
        }
    };

    stream
        .play()
        .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

    Ok((stream, retired, rate, name))
}

/// Find the requested device, falling back to the default device
fn select_device(device_name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    if let Some(name) = device_name {
        let mut devices = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

        if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
            info!("Found requested audio device: {}", name);
            return Ok(device);
        }
        warn!("Requested device '{}' not found, falling back to default device", name);
    }

    host.default_output_device()
        .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut mixer: VoiceMixer,
    mut commands: HeapCons<VoiceCommand>,
    error_flag: Arc<AtomicBool>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                while let Some(command) = commands.try_pop() {
                    mixer.apply(command);
                }

                if scratch.len() != data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                mixer.render(&mut scratch, channels);

                for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                    *out = T::from_sample(sample);
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
                error_flag.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}
