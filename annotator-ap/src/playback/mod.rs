//! Chunked streaming playback engine

pub mod chunk;
pub mod chunk_store;
pub mod engine;
pub mod events;
pub mod loader;
pub mod reporter;
pub mod scheduler;
pub mod transport;
pub mod window;

pub use chunk::Track;
pub use chunk_store::ChunkStore;
pub use engine::{EngineCore, EnginePorts, PlaybackEngine};
pub use events::{ControlCommand, EngineMessage};
pub use loader::{ChunkLoader, HttpChunkLoader, LoadDispatcher, TaskDispatcher};
pub use transport::{TransportSnapshot, AVAILABLE_RATES};
