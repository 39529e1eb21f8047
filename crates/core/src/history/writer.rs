use std::sync::Arc;

use tokio::sync::mpsc;

use super::{HistoryEventEnvelope, HistoryHandle, HistoryRecord, HistoryStore};

/// Background task draining history events into storage
pub struct HistoryWriter {
    rx: mpsc::Receiver<HistoryEventEnvelope>,
    store: Arc<dyn HistoryStore>,
}

impl HistoryWriter {
    pub fn new(rx: mpsc::Receiver<HistoryEventEnvelope>, store: Arc<dyn HistoryStore>) -> Self {
        Self { rx, store }
    }

    /// Consume events until every handle is dropped.
    pub async fn run(mut self) {
        tracing::info!("History writer started");

        while let Some(envelope) = self.rx.recv().await {
            let record = HistoryRecord {
                id: 0,
                timestamp: envelope.timestamp,
                event_type: envelope.event.event_type().to_string(),
                show_id: envelope.event.show_id(),
                release_name: envelope.event.release_name().map(String::from),
                data: envelope.event,
            };

            if let Err(e) = self.store.insert(&record) {
                tracing::error!("Failed to write history event: {}", e);
            }
        }

        tracing::info!("History writer shutting down");
    }
}

/// Create the history handle and the writer to spawn with
/// `tokio::spawn(writer.run())`.
pub fn create_history_system(
    store: Arc<dyn HistoryStore>,
    buffer_size: usize,
) -> (HistoryHandle, HistoryWriter) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (HistoryHandle::new(tx), HistoryWriter::new(rx, store))
}
