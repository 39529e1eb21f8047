use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Priority, QueueAction, QueueError, QueueItem, QueueItemError, QueueItemInfo};
use crate::history::{HistoryEvent, HistoryHandle};
use crate::metrics;
use crate::scheduler::ScheduledAction;

const RECENT_LIMIT: usize = 50;

/// Summary of a queue for the API.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub name: String,
    pub paused: bool,
    pub busy: bool,
    pub current: Option<QueueItemInfo>,
    pub queued: usize,
}

struct Running {
    info: QueueItemInfo,
    dedup_key: Option<String>,
    started: Instant,
    handle: JoinHandle<Result<(), QueueItemError>>,
}

struct QueueState {
    items: Vec<QueueItem>,
    current: Option<Running>,
    min_priority: u8,
    recent: VecDeque<QueueItemInfo>,
    next_seq: u64,
}

/// Priority queue that runs at most one item at a time.
pub struct GenericQueue {
    name: String,
    state: Mutex<QueueState>,
    history: Option<HistoryHandle>,
}

impl GenericQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(QueueState {
                items: Vec::new(),
                current: None,
                min_priority: 0,
                recent: VecDeque::new(),
                next_seq: 0,
            }),
            history: None,
        }
    }

    /// Record finished items as `queue_item_finished` history events.
    pub fn with_history(mut self, history: HistoryHandle) -> Self {
        self.history = Some(history);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an action. Fails if an item with the same dedup key is queued
    /// or running.
    pub fn add_item(
        &self,
        action: Arc<dyn QueueAction>,
        priority: Priority,
    ) -> Result<Uuid, QueueError> {
        let mut state = self.state();

        if let Some(key) = action.dedup_key() {
            let running = state
                .current
                .as_ref()
                .is_some_and(|r| r.dedup_key.as_deref() == Some(key.as_str()));
            let queued = state
                .items
                .iter()
                .any(|i| i.action.dedup_key().as_deref() == Some(key.as_str()));
            if running || queued {
                return Err(QueueError::Duplicate(key));
            }
        }

        let item = QueueItem {
            id: Uuid::new_v4(),
            priority,
            added: Utc::now(),
            seq: state.next_seq,
            action,
        };
        state.next_seq += 1;

        let id = item.id;
        debug!(queue = %self.name, item = %item.action.name(), ?priority, "Queued item");
        metrics::QUEUE_ITEMS_ADDED
            .with_label_values(&[&self.name, item.action.kind()])
            .inc();
        state.items.push(item);

        Ok(id)
    }

    /// One queue cycle: collect a finished item, then start the next one if
    /// its priority clears the threshold (or `force` is set).
    pub fn run(&self, force: bool) {
        let mut state = self.state();

        if state
            .current
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
        {
            return;
        }

        if let Some(finished) = state.current.take() {
            let info = self.finish(finished);
            state.recent.push_front(info);
            state.recent.truncate(RECENT_LIMIT);
        }

        if state.items.is_empty() {
            return;
        }

        state
            .items
            .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));

        if !force && state.items[0].priority.value() < state.min_priority {
            return;
        }

        let item = state.items.remove(0);
        let mut info = item.info();
        info.started_at = Some(Utc::now());
        info!(queue = %self.name, item = %info.name, "Starting queue item");

        let action = Arc::clone(&item.action);
        let handle = tokio::spawn(async move { action.run().await });

        state.current = Some(Running {
            info,
            dedup_key: item.action.dedup_key(),
            started: Instant::now(),
            handle,
        });
    }

    fn finish(&self, running: Running) -> QueueItemInfo {
        let Running {
            mut info,
            started,
            handle,
            ..
        } = running;

        let error = match handle.now_or_never() {
            Some(Ok(Ok(()))) => None,
            Some(Ok(Err(e))) => Some(e.to_string()),
            Some(Err(join_err)) if join_err.is_panic() => Some("queue item panicked".to_string()),
            Some(Err(join_err)) => Some(join_err.to_string()),
            None => Some("queue item result unavailable".to_string()),
        };

        let elapsed = started.elapsed();
        info.finished_at = Some(Utc::now());
        info.success = Some(error.is_none());
        info.error = error.clone();

        match &error {
            None => info!(queue = %self.name, item = %info.name, "Queue item finished"),
            Some(e) => warn!(queue = %self.name, item = %info.name, error = %e, "Queue item failed"),
        }

        let outcome = if error.is_none() { "success" } else { "failure" };
        metrics::QUEUE_ITEMS_FINISHED
            .with_label_values(&[&self.name, outcome])
            .inc();
        metrics::QUEUE_ITEM_DURATION_SECONDS
            .with_label_values(&[&self.name])
            .observe(elapsed.as_secs_f64());

        if let Some(history) = &self.history {
            history.try_emit(HistoryEvent::QueueItemFinished {
                queue: self.name.clone(),
                item: info.name.clone(),
                kind: info.kind.clone(),
                success: error.is_none(),
                error,
                duration_ms: elapsed.as_millis() as u64,
            });
        }

        info
    }

    /// Stop starting new items; a running item completes normally.
    pub fn pause(&self) {
        info!(queue = %self.name, "Pausing queue");
        self.state().min_priority = u8::MAX;
    }

    pub fn unpause(&self) {
        info!(queue = %self.name, "Unpausing queue");
        self.state().min_priority = 0;
    }

    pub fn is_paused(&self) -> bool {
        self.state().min_priority > Priority::High.value()
    }

    pub fn current(&self) -> Option<QueueItemInfo> {
        self.state().current.as_ref().map(|r| r.info.clone())
    }

    /// Queued items in the order they will run.
    pub fn queued(&self) -> Vec<QueueItemInfo> {
        let state = self.state();
        let mut items: Vec<&QueueItem> = state.items.iter().collect();
        items.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        items.into_iter().map(QueueItem::info).collect()
    }

    /// Recently finished items, newest first.
    pub fn history(&self) -> Vec<QueueItemInfo> {
        self.state().recent.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().items.is_empty()
    }

    /// An item is running, or has finished but not been collected yet.
    pub fn is_busy(&self) -> bool {
        self.state().current.is_some()
    }

    /// Remove a queued item. Running items cannot be removed.
    pub fn remove(&self, id: Uuid) -> Result<QueueItemInfo, QueueError> {
        let mut state = self.state();
        let pos = state
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or(QueueError::NotFound(id))?;
        let item = state.items.remove(pos);
        info!(queue = %self.name, item = %item.action.name(), "Removed queued item");
        Ok(item.info())
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.state();
        QueueStatus {
            name: self.name.clone(),
            paused: state.min_priority > Priority::High.value(),
            busy: state.current.is_some(),
            current: state.current.as_ref().map(|r| r.info.clone()),
            queued: state.items.len(),
        }
    }
}

#[async_trait]
impl ScheduledAction for GenericQueue {
    async fn run(&self, force: bool) {
        GenericQueue::run(self, force);
    }
}
