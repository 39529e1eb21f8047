use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// History event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEvent {
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    ShowAdded {
        show_id: i64,
        name: String,
    },
    ShowRemoved {
        show_id: i64,
        name: String,
    },

    /// A release was handed to a download client.
    Snatched {
        show_id: i64,
        season: u32,
        episodes: Vec<u32>,
        release_name: String,
        provider: String,
        quality: String,
        client: String,
    },
    /// A completed download was placed into the library.
    Downloaded {
        show_id: i64,
        season: u32,
        episodes: Vec<u32>,
        release_name: String,
        quality: String,
        destination: String,
    },
    /// A release was marked failed and must not be snatched again.
    DownloadFailed {
        show_id: i64,
        season: u32,
        episode: u32,
        release_name: String,
    },

    QueueItemFinished {
        queue: String,
        item: String,
        kind: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        duration_ms: u64,
    },
}

impl HistoryEvent {
    /// Stable name stored in the `event_type` column.
    pub fn event_type(&self) -> &'static str {
        match self {
            HistoryEvent::ServiceStarted { .. } => "service_started",
            HistoryEvent::ServiceStopped { .. } => "service_stopped",
            HistoryEvent::ShowAdded { .. } => "show_added",
            HistoryEvent::ShowRemoved { .. } => "show_removed",
            HistoryEvent::Snatched { .. } => "snatched",
            HistoryEvent::Downloaded { .. } => "downloaded",
            HistoryEvent::DownloadFailed { .. } => "download_failed",
            HistoryEvent::QueueItemFinished { .. } => "queue_item_finished",
        }
    }

    pub fn show_id(&self) -> Option<i64> {
        match self {
            HistoryEvent::ShowAdded { show_id, .. }
            | HistoryEvent::ShowRemoved { show_id, .. }
            | HistoryEvent::Snatched { show_id, .. }
            | HistoryEvent::Downloaded { show_id, .. }
            | HistoryEvent::DownloadFailed { show_id, .. } => Some(*show_id),
            _ => None,
        }
    }

    pub fn release_name(&self) -> Option<&str> {
        match self {
            HistoryEvent::Snatched { release_name, .. }
            | HistoryEvent::Downloaded { release_name, .. }
            | HistoryEvent::DownloadFailed { release_name, .. } => Some(release_name),
            _ => None,
        }
    }
}

/// A persisted history event.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,
    pub data: HistoryEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = HistoryEvent::Snatched {
            show_id: 3,
            season: 1,
            episodes: vec![2, 3],
            release_name: "Show.S01E02E03.720p.HDTV.x264-GRP".to_string(),
            provider: "jackett".to_string(),
            quality: "hdtv".to_string(),
            client: "qbittorrent".to_string(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "snatched");
        assert_eq!(json["episodes"], serde_json::json!([2, 3]));

        let back: HistoryEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_event_accessors() {
        let failed = HistoryEvent::DownloadFailed {
            show_id: 7,
            season: 2,
            episode: 5,
            release_name: "Bad.Release".to_string(),
        };
        assert_eq!(failed.event_type(), "download_failed");
        assert_eq!(failed.show_id(), Some(7));
        assert_eq!(failed.release_name(), Some("Bad.Release"));

        let started = HistoryEvent::ServiceStarted {
            version: "0.1.0".to_string(),
            config_hash: "abc".to_string(),
        };
        assert_eq!(started.show_id(), None);
        assert_eq!(started.release_name(), None);
    }
}
