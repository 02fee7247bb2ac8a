//! Test helper modules for annotator-ap integration tests
//!
//! - fakes: recording playback sink, scripted load dispatcher, instant loader
//! - harness: engine core wired to a manual clock
//! - audio_generator: in-memory WAV fixtures

#![allow(dead_code)]

pub mod audio_generator;
pub mod fakes;
pub mod harness;

pub use audio_generator::{garbage_bytes, silent_wav, sine_wav};
pub use fakes::{InstantLoader, RecordingSink, ScriptedDispatcher};
pub use harness::{test_track, CoreHarness, TEST_SAMPLE_RATE};
