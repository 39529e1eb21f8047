use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{HistoryError, HistoryEvent, HistoryFilter, HistoryRecord, HistoryStore};

/// SQLite-backed history store
pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    pub fn new(path: &Path) -> Result<Self, HistoryError> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.busy_timeout(Duration::from_secs(5)).map_err(db_err)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self, HistoryError> {
        Self::with_connection(Connection::open_in_memory().map_err(db_err)?)
    }

    fn with_connection(conn: Connection) -> Result<Self, HistoryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_type TEXT NOT NULL,
                show_id INTEGER,
                release_name TEXT,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_timestamp ON history(timestamp);
            CREATE INDEX IF NOT EXISTS idx_history_event_type ON history(event_type);
            CREATE INDEX IF NOT EXISTS idx_history_show_id ON history(show_id);
            CREATE INDEX IF NOT EXISTS idx_history_release ON history(release_name COLLATE NOCASE);
            "#,
        )
        .map_err(db_err)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn build_where_clause(filter: &HistoryFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref event_type) = filter.event_type {
            conditions.push("event_type = ?");
            params.push(Box::new(event_type.clone()));
        }

        if let Some(show_id) = filter.show_id {
            conditions.push("show_id = ?");
            params.push(Box::new(show_id));
        }

        if let Some(ref from) = filter.from {
            conditions.push("timestamp >= ?");
            params.push(Box::new(from.to_rfc3339()));
        }

        if let Some(ref to) = filter.to {
            conditions.push("timestamp <= ?");
            params.push(Box::new(to.to_rfc3339()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

fn db_err(e: rusqlite::Error) -> HistoryError {
    HistoryError::Database(e.to_string())
}

impl HistoryStore for SqliteHistoryStore {
    fn insert(&self, record: &HistoryRecord) -> Result<i64, HistoryError> {
        let conn = self.conn.lock().unwrap();

        let data_json = serde_json::to_string(&record.data)
            .map_err(|e| HistoryError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO history (timestamp, event_type, show_id, release_name, data) VALUES (?, ?, ?, ?, ?)",
            params![
                record.timestamp.to_rfc3339(),
                record.event_type,
                record.show_id,
                record.release_name,
                data_json,
            ],
        )
        .map_err(db_err)?;

        Ok(conn.last_insert_rowid())
    }

    fn query(&self, filter: &HistoryFilter) -> Result<Vec<HistoryRecord>, HistoryError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, mut params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT id, timestamp, event_type, show_id, release_name, data FROM history {} ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            where_clause
        );
        params.push(Box::new(filter.limit));
        params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(db_err)?;

        let mut records = Vec::new();
        for row in rows {
            let (id, timestamp, event_type, show_id, release_name, data) = row.map_err(db_err)?;

            let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| HistoryError::Database(format!("Invalid timestamp: {}", e)))?
                .into();
            let data: HistoryEvent = serde_json::from_str(&data)
                .map_err(|e| HistoryError::Serialization(e.to_string()))?;

            records.push(HistoryRecord {
                id,
                timestamp,
                event_type,
                show_id,
                release_name,
                data,
            });
        }

        Ok(records)
    }

    fn count(&self, filter: &HistoryFilter) -> Result<i64, HistoryError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM history {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(db_err)
    }

    fn is_failed_release(&self, release_name: &str) -> Result<bool, HistoryError> {
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM history WHERE event_type = 'download_failed' AND release_name = ? COLLATE NOCASE",
                params![release_name],
                |row| row.get(0),
            )
            .map_err(db_err)?;

        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(event: HistoryEvent) -> HistoryRecord {
        HistoryRecord {
            id: 0,
            timestamp: Utc::now(),
            event_type: event.event_type().to_string(),
            show_id: event.show_id(),
            release_name: event.release_name().map(String::from),
            data: event,
        }
    }

    fn snatched(show_id: i64, release: &str) -> HistoryEvent {
        HistoryEvent::Snatched {
            show_id,
            season: 1,
            episodes: vec![1],
            release_name: release.to_string(),
            provider: "jackett".to_string(),
            quality: "hdtv".to_string(),
            client: "blackhole".to_string(),
        }
    }

    #[test]
    fn test_insert_and_query() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        let id = store.insert(&record(snatched(1, "A.S01E01"))).unwrap();
        assert!(id > 0);

        let records = store.query(&HistoryFilter::new()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, "snatched");
        assert_eq!(records[0].release_name.as_deref(), Some("A.S01E01"));
        assert!(matches!(records[0].data, HistoryEvent::Snatched { .. }));
    }

    #[test]
    fn test_filters_and_pagination() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        for i in 0..5 {
            store
                .insert(&record(snatched(i % 2, &format!("R{}", i))))
                .unwrap();
        }
        store
            .insert(&record(HistoryEvent::ServiceStopped {
                reason: "x".to_string(),
            }))
            .unwrap();

        let filter = HistoryFilter::new().with_show_id(0);
        assert_eq!(store.count(&filter).unwrap(), 3);

        let filter = HistoryFilter::new().with_event_type("snatched");
        assert_eq!(store.count(&filter).unwrap(), 5);

        let page = store
            .query(&HistoryFilter::new().with_limit(2).with_offset(1))
            .unwrap();
        assert_eq!(page.len(), 2);

        assert_eq!(store.count(&HistoryFilter::new()).unwrap(), 6);
    }

    #[test]
    fn test_is_failed_release() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        store.insert(&record(snatched(1, "Show.S01E01-GRP"))).unwrap();
        assert!(!store.is_failed_release("Show.S01E01-GRP").unwrap());

        store
            .insert(&record(HistoryEvent::DownloadFailed {
                show_id: 1,
                season: 1,
                episode: 1,
                release_name: "Show.S01E01-GRP".to_string(),
            }))
            .unwrap();
        assert!(store.is_failed_release("show.s01e01-grp").unwrap());
    }
}
