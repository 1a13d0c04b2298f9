//! Per-call row-change notifications.
//!
//! Each mutation to a session row or transcript table publishes a
//! [`StoreEvent`] on a per-call broadcast channel; the live view's SSE
//! endpoint subscribes by call id. Lagged subscribers drop the oldest
//! events (the snapshot endpoint is the catch-up path).

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::session::{CallSession, StoredChunk};

/// A single row-level change for one call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StoreEvent {
    /// The session row changed (status, advice, analyzing, last_error…).
    Session { session: CallSession },
    /// A transcript chunk was appended.
    Chunk { chunk: StoredChunk },
}

/// Per-call broadcast channels for row-change fan-out.
pub(crate) struct EventHub {
    channels: RwLock<HashMap<String, broadcast::Sender<StoreEvent>>>,
}

impl EventHub {
    pub(crate) fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the broadcast channel for a call.
    pub(crate) fn subscribe(&self, call_id: &str) -> broadcast::Receiver<StoreEvent> {
        let mut channels = self.channels.write();
        channels
            .entry(call_id.to_owned())
            .or_insert_with(|| broadcast::channel(128).0)
            .subscribe()
    }

    /// Broadcast an event to all subscribers of a call. No-op when nobody
    /// is listening.
    pub(crate) fn emit(&self, call_id: &str, event: StoreEvent) {
        let channels = self.channels.read();
        if let Some(tx) = channels.get(call_id) {
            let _ = tx.send(event);
        }
    }

    /// Drop the channel for a call that is gone.
    pub(crate) fn cleanup(&self, call_id: &str) {
        self.channels.write().remove(call_id);
    }
}
