//! HTTP chunk loader tests against a local axum server
//!
//! Chunks are real WAV files generated with hound and decoded by symphonia.

mod helpers;

use annotator_ap::audio::{ManualClock, SymphoniaDecoder};
use annotator_ap::playback::{ChunkLoader, HttpChunkLoader};
use annotator_ap::{EngineConfig, EngineListeners, Error, PlaybackEngine, Track};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use helpers::{garbage_bytes, silent_wav, sine_wav, RecordingSink};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const RATE: u32 = 8_000;

type ChunkFiles = Arc<HashMap<String, Vec<u8>>>;

async fn serve_chunk(State(files): State<ChunkFiles>, Path(name): Path<String>) -> Response {
    match files.get(&name) {
        Some(bytes) => (StatusCode::OK, bytes.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serve `/chunks/{name}` from memory; returns the bound address
async fn start_server(files: HashMap<String, Vec<u8>>) -> SocketAddr {
    let app = Router::new()
        .route("/chunks/:name", get(serve_chunk))
        .with_state(Arc::new(files));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// 3.5 s track in 1 s chunks:
/// - 0: mono sine at the track rate
/// - 1: stereo silence at the track rate
/// - 2: half a second of mono sine at twice the track rate
/// - 3: not audio
fn recording_files() -> HashMap<String, Vec<u8>> {
    HashMap::from([
        ("0.wav".to_string(), sine_wav(RATE, 1, RATE as usize, 440.0)),
        ("1.wav".to_string(), silent_wav(RATE, 2, RATE as usize)),
        ("2.wav".to_string(), sine_wav(RATE * 2, 1, RATE as usize, 440.0)),
        ("3.wav".to_string(), garbage_bytes()),
    ])
}

fn track_at(addr: SocketAddr) -> Track {
    Track::new(3.5, RATE, format!("http://{}/chunks/", addr), 1.0).unwrap()
}

fn wav_loader(track: Track) -> HttpChunkLoader {
    HttpChunkLoader::new(track, "wav", Arc::new(SymphoniaDecoder::with_extension("wav"))).unwrap()
}

#[tokio::test]
async fn test_loads_and_decodes_mono_chunk() {
    let addr = start_server(recording_files()).await;
    let loader = wav_loader(track_at(addr));

    let pcm = loader.load(0).await.unwrap();
    assert_eq!(pcm.sample_rate, RATE);
    assert_eq!(pcm.channels, 1);
    assert_eq!(pcm.frames, RATE as usize);

    let peak = pcm.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(peak > 0.4 && peak < 0.6, "peak {}", peak);
}

#[tokio::test]
async fn test_keeps_stereo_channels() {
    let addr = start_server(recording_files()).await;
    let loader = wav_loader(track_at(addr));

    let pcm = loader.load(1).await.unwrap();
    assert_eq!(pcm.channels, 2);
    assert_eq!(pcm.frames, RATE as usize);
    assert!(pcm.samples.iter().all(|s| *s == 0.0));
}

#[tokio::test]
async fn test_resamples_to_track_rate() {
    let addr = start_server(recording_files()).await;
    let loader = wav_loader(track_at(addr));

    let pcm = loader.load(2).await.unwrap();
    assert_eq!(pcm.sample_rate, RATE);
    let expected = RATE as usize / 2;
    assert!(
        pcm.frames.abs_diff(expected) < 200,
        "got {} frames",
        pcm.frames
    );
}

#[tokio::test]
async fn test_undecodable_chunk_is_decode_error() {
    let addr = start_server(recording_files()).await;
    let loader = wav_loader(track_at(addr));

    let result = loader.load(3).await;
    assert!(matches!(result, Err(Error::Decode(_))), "{:?}", result);
}

#[tokio::test]
async fn test_missing_chunk_is_network_error() {
    let addr = start_server(HashMap::new()).await;
    let loader = wav_loader(track_at(addr));

    let result = loader.load(0).await;
    match result {
        Err(Error::Network(message)) => assert!(message.contains("404"), "{}", message),
        other => panic!("expected network error, got {:?}", other.map(|p| p.frames)),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let loader = wav_loader(track_at(addr));
    let result = loader.load(0).await;
    assert!(matches!(result, Err(Error::Network(_))));
}

#[tokio::test]
async fn test_chunk_urls_follow_base_url() {
    let track = Track::new(185.0, RATE, "https://media.test/rec/42/", 60.0).unwrap();
    let loader = HttpChunkLoader::new(track, "mp3", Arc::new(SymphoniaDecoder::new())).unwrap();

    assert_eq!(loader.url_for(0), "https://media.test/rec/42/0.mp3");
    assert_eq!(loader.url_for(3), "https://media.test/rec/42/3.mp3");
}

#[tokio::test]
async fn test_engine_streams_from_http() {
    let addr = start_server(recording_files()).await;
    let track = track_at(addr);
    let sink = RecordingSink::new();
    let config = EngineConfig {
        chunk_duration_secs: 1.0,
        chunk_extension: "wav".to_string(),
        ..EngineConfig::default()
    };

    let engine = PlaybackEngine::start(
        track.clone(),
        config,
        Arc::new(ManualClock::new()),
        Box::new(sink.clone()),
        Arc::new(wav_loader(track)),
        EngineListeners::default(),
    )
    .unwrap();

    engine.play(Some(0.0), None).await.unwrap();
    let snapshot = tokio::time::timeout(
        Duration::from_secs(10),
        engine.wait_for(|s| s.resident.len() == 3),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(snapshot.is_playing());

    let first = sink.active_for_chunk(0).unwrap();
    let second = sink.active_for_chunk(1).unwrap();
    assert_eq!(first.buffer.frames, RATE as usize);
    assert!((second.start_at - first.ends_at()).abs() < 1e-9);

    engine.shutdown().await.unwrap();
}
