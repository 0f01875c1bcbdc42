//! Event Store Contract for Resumability
//!
//! The server transport never persists anything itself. When an event store
//! is configured, every SSE write is recorded first and the returned event
//! id rides the SSE `id:` field; a client reconnecting with `Last-Event-ID`
//! gets everything after that id replayed in storage order.
//!
//! Implementations may keep events in memory, on disk, or in an external
//! service. The store is called sequentially per transport but MUST be safe
//! across concurrent sessions.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

// Layer 3: Internal module imports
use crate::protocol::{JsonRpcMessage, McpError, McpResult};

/// Identifier of one SSE stream within a session
pub type StreamId = u64;

/// Opaque, totally ordered (per stream) event identifier
pub type EventId = String;

/// Resumability contract: two methods, nothing else
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Record a message about to be written to `stream_id`; returns the
    /// event id to emit on the SSE frame
    async fn store_event(
        &self,
        stream_id: StreamId,
        message: JsonRpcMessage,
    ) -> McpResult<EventId>;

    /// Replay every message on `last_event_id`'s stream stored strictly
    /// after it, in storage order, through `sender`; returns the stream id
    /// the events belong to
    async fn replay_events_after(
        &self,
        last_event_id: EventId,
        sender: mpsc::UnboundedSender<(EventId, JsonRpcMessage)>,
    ) -> McpResult<StreamId>;
}

/// In-memory reference implementation
///
/// Events are retained per stream up to `max_events_per_stream`; older
/// events roll off the front. Retention policy is implementation-defined by
/// contract, so dropping history under pressure is acceptable.
#[derive(Debug)]
pub struct InMemoryEventStore {
    streams: DashMap<StreamId, Vec<(u64, JsonRpcMessage)>>,
    counter: AtomicU64,
    max_events_per_stream: usize,
}

impl InMemoryEventStore {
    /// Create a store retaining at most `max_events_per_stream` per stream
    pub fn new(max_events_per_stream: usize) -> Arc<Self> {
        Arc::new(Self {
            streams: DashMap::new(),
            counter: AtomicU64::new(0),
            max_events_per_stream,
        })
    }

    /// Number of retained events on a stream, for diagnostics
    pub fn stream_len(&self, stream_id: StreamId) -> usize {
        self.streams.get(&stream_id).map_or(0, |s| s.len())
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self {
            streams: DashMap::new(),
            counter: AtomicU64::new(0),
            max_events_per_stream: 1024,
        }
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn store_event(
        &self,
        stream_id: StreamId,
        message: JsonRpcMessage,
    ) -> McpResult<EventId> {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let mut stream = self.streams.entry(stream_id).or_default();
        stream.push((seq, message));
        if stream.len() > self.max_events_per_stream {
            let excess = stream.len() - self.max_events_per_stream;
            stream.drain(..excess);
        }
        Ok(seq.to_string())
    }

    async fn replay_events_after(
        &self,
        last_event_id: EventId,
        sender: mpsc::UnboundedSender<(EventId, JsonRpcMessage)>,
    ) -> McpResult<StreamId> {
        let after: u64 = last_event_id
            .parse()
            .map_err(|_| McpError::invalid_request(format!("unknown event id {last_event_id}")))?;

        for entry in self.streams.iter() {
            if entry.value().iter().any(|(seq, _)| *seq == after) {
                let stream_id = *entry.key();
                for (seq, message) in entry.value().iter().filter(|(seq, _)| *seq > after) {
                    let _ = sender.send((seq.to_string(), message.clone()));
                }
                return Ok(stream_id);
            }
        }
        Err(McpError::invalid_request(format!(
            "event id {last_event_id} not found in any stream"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::JsonRpcNotification;
    use serde_json::json;

    fn note(n: u64) -> JsonRpcMessage {
        JsonRpcMessage::Notification(JsonRpcNotification::new(
            "notifications/message",
            Some(json!({"n": n})),
        ))
    }

    #[tokio::test]
    async fn replay_emits_strictly_after_in_order() {
        let store = InMemoryEventStore::new(64);

        // Events 1..=4 on stream 0 (ids are global and monotonic).
        let mut ids = Vec::new();
        for n in 1..=4 {
            ids.push(store.store_event(0, note(n)).await.unwrap());
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let stream = store
            .replay_events_after(ids[1].clone(), tx)
            .await
            .unwrap();
        assert_eq!(stream, 0);

        let mut replayed = Vec::new();
        while let Ok(item) = rx.try_recv() {
            replayed.push(item);
        }
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[0].0, ids[2]);
        assert_eq!(replayed[1].0, ids[3]);
    }

    #[tokio::test]
    async fn replay_locates_the_owning_stream() {
        let store = InMemoryEventStore::new(64);
        let _s0 = store.store_event(0, note(1)).await.unwrap();
        let s7 = store.store_event(7, note(2)).await.unwrap();
        let _s7b = store.store_event(7, note(3)).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let stream = store.replay_events_after(s7, tx).await.unwrap();
        assert_eq!(stream, 7);
        assert_eq!(rx.try_recv().unwrap().1, note(3));
    }

    #[tokio::test]
    async fn unknown_event_id_is_an_error() {
        let store = InMemoryEventStore::new(64);
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(store
            .replay_events_after("999".to_string(), tx)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn retention_rolls_old_events_off() {
        let store = InMemoryEventStore::new(2);
        for n in 1..=5 {
            store.store_event(0, note(n)).await.unwrap();
        }
        assert_eq!(store.stream_len(0), 2);
    }
}
