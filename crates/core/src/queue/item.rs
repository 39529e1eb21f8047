use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::QueueAction;

/// Queue priority. Higher runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 10,
    Normal = 20,
    High = 30,
}

impl Priority {
    pub fn value(self) -> u8 {
        self as u8
    }
}

/// An action waiting in (or running from) a queue.
pub struct QueueItem {
    pub id: Uuid,
    pub priority: Priority,
    pub added: DateTime<Utc>,
    /// Insertion order; breaks ties between equal `added` stamps.
    pub(crate) seq: u64,
    pub action: Arc<dyn QueueAction>,
}

impl QueueItem {
    pub fn info(&self) -> QueueItemInfo {
        QueueItemInfo {
            id: self.id,
            name: self.action.name(),
            kind: self.action.kind().to_string(),
            priority: self.priority,
            added: self.added,
            started_at: None,
            finished_at: None,
            success: None,
            error: None,
        }
    }
}

/// Serializable view of a queue item.
#[derive(Debug, Clone, Serialize)]
pub struct QueueItemInfo {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub priority: Priority,
    pub added: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
