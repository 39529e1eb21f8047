//! Priority work queues with a single in-flight item.
//!
//! Searches and post-processing run as queue items so that only one of each
//! kind touches providers or the library at a time. A [`GenericQueue`] is
//! driven by a short-cycle scheduler calling [`GenericQueue::run`].

mod generic;
mod item;

pub use generic::{GenericQueue, QueueStatus};
pub use item::{Priority, QueueItem, QueueItemInfo};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("an equivalent item is already queued: {0}")]
    Duplicate(String),

    #[error("queue item not found: {0}")]
    NotFound(Uuid),
}

/// Failure reported by a queue action.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct QueueItemError(pub String);

impl QueueItemError {
    pub fn new(msg: impl std::fmt::Display) -> Self {
        Self(msg.to_string())
    }
}

/// Work executed by a queue.
#[async_trait]
pub trait QueueAction: Send + Sync + 'static {
    /// Human-readable description, e.g. `Backlog search: Show Name`.
    fn name(&self) -> String;

    /// Short machine name (`daily_search`, `post_process`, ...).
    fn kind(&self) -> &'static str;

    /// Items with equal keys may not be queued twice.
    fn dedup_key(&self) -> Option<String> {
        None
    }

    async fn run(&self) -> Result<(), QueueItemError>;
}
