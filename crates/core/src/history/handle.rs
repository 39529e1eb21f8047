use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::HistoryEvent;

/// History event stamped with the time it was emitted.
#[derive(Debug, Clone)]
pub struct HistoryEventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: HistoryEvent,
}

/// Handle for emitting history events
///
/// Cheaply cloneable; events go through a bounded channel to the
/// [`HistoryWriter`](super::HistoryWriter).
#[derive(Clone)]
pub struct HistoryHandle {
    tx: mpsc::Sender<HistoryEventEnvelope>,
}

impl HistoryHandle {
    pub fn new(tx: mpsc::Sender<HistoryEventEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit an event, waiting for channel capacity.
    /// A closed channel is logged, never returned to the caller.
    pub async fn emit(&self, event: HistoryEvent) {
        let envelope = HistoryEventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::error!("Failed to emit history event: {}", e);
        }
    }

    /// Emit without waiting. Returns false if the channel is full or closed.
    pub fn try_emit(&self, event: HistoryEvent) -> bool {
        let envelope = HistoryEventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to emit history event: {}", e);
                false
            }
        }
    }
}
