//! Audio Player (annotator-ap) - Main entry point
//!
//! Streams a chunked recording from an HTTP source to the default output
//! device and prints the position while playing.

use std::path::PathBuf;
use std::sync::Arc;

use annotator_ap::audio::{DeviceOutput, SymphoniaDecoder};
use annotator_ap::playback::HttpChunkLoader;
use annotator_ap::{EngineConfig, EngineListeners, PlaybackEngine, Track};
use annotator_common::config::{resolve_config_path, validate_log_level, TomlConfig};
use annotator_common::human_time::format_progress;
use annotator_common::PlaybackStatus;
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for annotator-ap
#[derive(Parser, Debug)]
#[command(name = "annotator-ap")]
#[command(about = "Chunked streaming audio player")]
#[command(version)]
struct Args {
    /// Chunk base URL; chunk N is fetched from {base-url}N.{extension}
    #[arg(
        short,
        long,
        env = "ANNOTATOR_BASE_URL",
        required_unless_present = "list_devices"
    )]
    base_url: Option<String>,

    /// Total track duration in seconds
    #[arg(short, long, required_unless_present = "list_devices")]
    duration: Option<f64>,

    /// Track sample rate in Hz
    #[arg(short, long, default_value = "44100")]
    sample_rate: u32,

    /// Chunk file extension (overrides config)
    #[arg(short, long)]
    extension: Option<String>,

    /// Start position in seconds
    #[arg(long)]
    start: Option<f64>,

    /// Stop position in seconds
    #[arg(long)]
    end: Option<f64>,

    /// Playback rate
    #[arg(short, long)]
    rate: Option<f64>,

    /// Path to TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output device name (overrides config)
    #[arg(long)]
    device: Option<String>,

    /// Print the available output devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_devices {
        for name in DeviceOutput::list_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let config_path = resolve_config_path(args.config.as_deref());
    let toml_config = TomlConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;
    validate_log_level(&toml_config.logging.level)?;

    // RUST_LOG wins over the config file
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("annotator_ap={}", toml_config.logging.level.to_ascii_lowercase()).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting annotator-ap {} (git {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("ANNOTATOR_GIT_HASH"),
        env!("ANNOTATOR_BUILD_TIMESTAMP")
    );
    if let Some(path) = config_path.as_ref() {
        info!("Config file: {}", path.display());
    }

    let mut engine_config = EngineConfig::from_section(&toml_config.engine);
    if let Some(extension) = args.extension {
        engine_config.chunk_extension = extension;
    }
    if args.device.is_some() {
        engine_config.output_device = args.device;
    }
    engine_config.validate().context("Invalid engine configuration")?;

    let base_url = args.base_url.context("--base-url is required")?;
    let duration = args.duration.context("--duration is required")?;
    let track = Track::new(
        duration,
        args.sample_rate,
        base_url,
        engine_config.chunk_duration_secs,
    )
    .context("Invalid track metadata")?;

    info!(
        "Track: {:.3}s at {}Hz in {} chunks from {}",
        track.duration(),
        track.sample_rate(),
        track.chunk_count(),
        track.chunk_base_url()
    );

    let (output, clock) = DeviceOutput::open(engine_config.output_device.clone())
        .context("Failed to open audio output")?;
    info!(
        "Output device: {} at {}Hz",
        output.device_name(),
        output.sample_rate()
    );

    let decoder = Arc::new(SymphoniaDecoder::with_extension(
        engine_config.chunk_extension.clone(),
    ));
    let loader = Arc::new(
        HttpChunkLoader::new(track.clone(), engine_config.chunk_extension.clone(), decoder)
            .context("Failed to create chunk loader")?,
    );

    let listeners = EngineListeners::default()
        .with_on_error(|message| error!("{}", message))
        .with_on_listen(move |position| println!("{}", format_progress(position, duration)));

    let engine = PlaybackEngine::start(
        track,
        engine_config,
        Arc::new(clock),
        Box::new(output),
        loader,
        listeners,
    )
    .context("Failed to start playback engine")?;

    let mut events = engine.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match event.to_json_line() {
                    Ok(line) => debug!("event {}", line),
                    Err(e) => warn!("Failed to serialize {} event: {}", event.event_type(), e),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Event log skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    if let Some(rate) = args.rate {
        engine.set_rate(rate).await.context("Invalid playback rate")?;
    }
    engine
        .play(args.start, args.end)
        .await
        .context("Failed to start playback")?;

    tokio::select! {
        _ = shutdown_signal() => {}
        finished = engine.wait_for(|snapshot| snapshot.status == PlaybackStatus::Paused) => {
            let snapshot = finished?;
            info!("Playback finished at {}", format_progress(snapshot.position, duration));
        }
    }

    if let Err(e) = engine.shutdown().await {
        warn!("Engine shutdown: {}", e);
    }
    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
