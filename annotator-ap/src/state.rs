//! Shared playback state
//!
//! Published by the engine actor, read by any number of handles: a watch
//! channel carries the latest transport snapshot and a broadcast channel
//! carries events.

use crate::playback::transport::TransportSnapshot;
use annotator_common::events::AnnotatorEvent;
use tokio::sync::{broadcast, watch};

/// Event buffer size per subscriber
const EVENT_CAPACITY: usize = 100;

/// Shared state accessible by all components
pub struct SharedState {
    /// Event broadcaster
    pub event_tx: broadcast::Sender<AnnotatorEvent>,

    snapshot_tx: watch::Sender<TransportSnapshot>,
}

impl SharedState {
    /// Create shared state for a track of `duration` seconds
    pub fn new(duration: f64) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshot_tx, _) = watch::channel(TransportSnapshot::initial(duration));
        Self {
            event_tx,
            snapshot_tx,
        }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast_event(&self, event: AnnotatorEvent) {
        // No receivers is OK
        let _ = self.event_tx.send(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe_events(&self) -> broadcast::Receiver<AnnotatorEvent> {
        self.event_tx.subscribe()
    }

    /// Replace the published snapshot
    pub fn publish_snapshot(&self, snapshot: TransportSnapshot) {
        self.snapshot_tx.send_replace(snapshot);
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> TransportSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Receiver notified on every published snapshot
    pub fn watch_snapshot(&self) -> watch::Receiver<TransportSnapshot> {
        self.snapshot_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annotator_common::PlaybackStatus;

    #[test]
    fn test_initial_snapshot_is_idle() {
        let state = SharedState::new(185.0);
        let snapshot = state.snapshot();
        assert_eq!(snapshot.status, PlaybackStatus::Idle);
        assert_eq!(snapshot.position, 0.0);
        assert_eq!(snapshot.duration, 185.0);
    }

    #[tokio::test]
    async fn test_events_reach_subscribers() {
        let state = SharedState::new(10.0);
        let mut rx = state.subscribe_events();
        state.broadcast_event(AnnotatorEvent::RateChanged {
            rate: 2.0,
            timestamp: chrono::Utc::now(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "RateChanged");
    }

    #[tokio::test]
    async fn test_publish_notifies_watchers() {
        let state = SharedState::new(10.0);
        let mut rx = state.watch_snapshot();
        let mut snapshot = state.snapshot();
        snapshot.position = 4.0;
        state.publish_snapshot(snapshot);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().position, 4.0);
    }
}
