//! Chunk Loader
//!
//! Fetches the encoded bytes of one chunk and decodes them to PCM. Loads
//! report through their returned future only; the engine decides what to do
//! with the result.

use crate::audio::decode::ChunkDecoder;
use crate::audio::types::PcmBuffer;
use crate::error::{Error, Result};
use crate::playback::chunk::Track;
use crate::playback::events::EngineMessage;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Default HTTP timeout for one chunk fetch
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Asynchronous fetch + decode of one chunk
pub trait ChunkLoader: Send + Sync {
    /// Load chunk `idx`; resolves exactly once with PCM or a load error
    fn load(&self, idx: usize) -> BoxFuture<'static, Result<PcmBuffer>>;
}

/// Chunk loader fetching `{chunk_base_url}{idx}.{ext}` over HTTP
pub struct HttpChunkLoader {
    client: reqwest::Client,
    track: Track,
    extension: String,
    decoder: Arc<dyn ChunkDecoder>,
}

impl HttpChunkLoader {
    pub fn new(track: Track, extension: impl Into<String>, decoder: Arc<dyn ChunkDecoder>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| Error::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            track,
            extension: extension.into(),
            decoder,
        })
    }

    /// URL chunk `idx` is fetched from
    pub fn url_for(&self, idx: usize) -> String {
        self.track.chunk_url(idx, &self.extension)
    }
}

impl ChunkLoader for HttpChunkLoader {
    fn load(&self, idx: usize) -> BoxFuture<'static, Result<PcmBuffer>> {
        let client = self.client.clone();
        let url = self.url_for(idx);
        let decoder = Arc::clone(&self.decoder);
        let sample_rate = self.track.sample_rate();
        let num_samples = self.track.num_samples(idx);

        async move {
            debug!(chunk = idx, url = %url, "Fetching chunk");

            let response = client
                .get(&url)
                .send()
                .await
                .map_err(|e| Error::Network(format!("GET {} failed: {}", url, e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::Network(format!("GET {} returned {}", url, status)));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| Error::Network(format!("Reading {} failed: {}", url, e)))?;

            debug!(chunk = idx, bytes = bytes.len(), "Fetched chunk, decoding");

            tokio::task::spawn_blocking(move || decoder.decode(bytes.to_vec(), sample_rate, num_samples))
                .await
                .map_err(|e| Error::Decode(format!("Decode task failed: {}", e)))?
        }
        .boxed()
    }
}

/// Starts loads on behalf of the engine
///
/// Completions come back to the engine as [`EngineMessage::ChunkLoaded`].
pub trait LoadDispatcher: Send {
    fn dispatch(&mut self, idx: usize);
}

/// Dispatcher running each load as a tokio task
///
/// Holds only a weak mailbox sender so pending loads never keep a dropped
/// engine alive.
pub struct TaskDispatcher {
    loader: Arc<dyn ChunkLoader>,
    mailbox: mpsc::WeakUnboundedSender<EngineMessage>,
}

impl TaskDispatcher {
    pub fn new(loader: Arc<dyn ChunkLoader>, mailbox: mpsc::WeakUnboundedSender<EngineMessage>) -> Self {
        Self { loader, mailbox }
    }
}

impl LoadDispatcher for TaskDispatcher {
    fn dispatch(&mut self, idx: usize) {
        let load = self.loader.load(idx);
        let mailbox = self.mailbox.clone();

        tokio::spawn(async move {
            let result = load.await;
            let delivered = mailbox
                .upgrade()
                .is_some_and(|tx| tx.send(EngineMessage::ChunkLoaded { idx, result }).is_ok());
            if !delivered {
                warn!("Engine stopped before chunk {} finished loading", idx);
            }
        });
    }
}
