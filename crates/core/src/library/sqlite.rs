//! SQLite-backed library store.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::{
    Episode, EpisodeStatus, EpisodeUpdate, LibraryError, LibraryStore, NewEpisode, NewShow, Show,
};
use crate::quality::Quality;

/// Applied in order; entry `n` upgrades the schema to version `n + 1`.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE shows (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE COLLATE NOCASE,
        aliases TEXT NOT NULL DEFAULT '[]',
        location TEXT NOT NULL,
        qualities TEXT NOT NULL DEFAULT '[]',
        paused INTEGER NOT NULL DEFAULT 0,
        air_by_date INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE TABLE episodes (
        show_id INTEGER NOT NULL REFERENCES shows(id) ON DELETE CASCADE,
        season INTEGER NOT NULL,
        episode INTEGER NOT NULL,
        name TEXT NOT NULL DEFAULT '',
        airdate TEXT,
        status TEXT NOT NULL,
        quality TEXT,
        location TEXT,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (show_id, season, episode)
    );
    "#,
    r#"
    ALTER TABLE episodes ADD COLUMN release_name TEXT;
    CREATE INDEX idx_episodes_status ON episodes(status);
    CREATE INDEX idx_episodes_airdate ON episodes(show_id, airdate);
    "#,
];

/// Schema version this build writes.
pub const SCHEMA_VERSION: i64 = MIGRATIONS.len() as i64;

const SHOW_COLUMNS: &str = "id, name, aliases, location, qualities, paused, air_by_date, created_at";
const EPISODE_COLUMNS: &str =
    "show_id, season, episode, name, airdate, status, quality, location, release_name, updated_at";

/// SQLite-backed library store.
pub struct SqliteLibraryStore {
    conn: Mutex<Connection>,
}

impl SqliteLibraryStore {
    /// Open (or create) the database and migrate it to [`SCHEMA_VERSION`].
    pub fn new(path: &Path) -> Result<Self, LibraryError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::with_connection(conn)
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self, LibraryError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> Result<Self, LibraryError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn schema_version(&self) -> Result<i64, LibraryError> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    fn load_show(conn: &Connection, id: i64) -> Result<Show, LibraryError> {
        conn.query_row(
            &format!("SELECT {} FROM shows WHERE id = ?", SHOW_COLUMNS),
            params![id],
            row_to_show,
        )
        .optional()?
        .ok_or_else(|| LibraryError::NotFound(format!("show {}", id)))
    }

    fn load_episode(
        conn: &Connection,
        show_id: i64,
        season: u32,
        episode: u32,
    ) -> Result<Episode, LibraryError> {
        conn.query_row(
            &format!(
                "SELECT {} FROM episodes WHERE show_id = ? AND season = ? AND episode = ?",
                EPISODE_COLUMNS
            ),
            params![show_id, season, episode],
            row_to_episode,
        )
        .optional()?
        .ok_or_else(|| {
            LibraryError::NotFound(format!("show {} episode S{:02}E{:02}", show_id, season, episode))
        })
    }

    fn query_episodes(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Episode>, LibraryError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, row_to_episode)?;
        let mut episodes = Vec::new();
        for row in rows {
            episodes.push(row?);
        }
        Ok(episodes)
    }
}

fn migrate(conn: &mut Connection) -> Result<(), LibraryError> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current > SCHEMA_VERSION {
        return Err(LibraryError::SchemaTooNew {
            found: current,
            supported: SCHEMA_VERSION,
        });
    }

    for (idx, sql) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        let version = idx as i64 + 1;
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        tx.commit()?;
        info!(version, "Applied library schema migration");
    }

    Ok(())
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn json_column<T: serde::de::DeserializeOwned + Default>(s: &str) -> T {
    serde_json::from_str(s).unwrap_or_default()
}

fn row_to_show(row: &Row) -> rusqlite::Result<Show> {
    let aliases: String = row.get(2)?;
    let location: String = row.get(3)?;
    let qualities: String = row.get(4)?;
    let created_at: String = row.get(7)?;

    Ok(Show {
        id: row.get(0)?,
        name: row.get(1)?,
        aliases: json_column(&aliases),
        location: PathBuf::from(location),
        qualities: json_column(&qualities),
        paused: row.get(5)?,
        air_by_date: row.get(6)?,
        created_at: parse_time(&created_at),
    })
}

fn row_to_episode(row: &Row) -> rusqlite::Result<Episode> {
    let airdate: Option<String> = row.get(4)?;
    let status: String = row.get(5)?;
    let quality: Option<String> = row.get(6)?;
    let location: Option<String> = row.get(7)?;
    let updated_at: String = row.get(9)?;

    Ok(Episode {
        show_id: row.get(0)?,
        season: row.get(1)?,
        episode: row.get(2)?,
        name: row.get(3)?,
        airdate: airdate.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        status: status.parse().unwrap_or(EpisodeStatus::Skipped),
        quality: quality.and_then(|q| q.parse::<Quality>().ok()),
        location: location.map(PathBuf::from),
        release_name: row.get(8)?,
        updated_at: parse_time(&updated_at),
    })
}

fn date_str(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn json_err(e: serde_json::Error) -> LibraryError {
    LibraryError::Database(e.to_string())
}

impl LibraryStore for SqliteLibraryStore {
    fn add_show(&self, show: &NewShow) -> Result<Show, LibraryError> {
        let name = show.name.trim();
        if name.is_empty() {
            return Err(LibraryError::InvalidInput("show name cannot be empty".to_string()));
        }

        let conn = self.conn.lock().unwrap();

        let exists: bool = conn
            .query_row("SELECT 1 FROM shows WHERE name = ?", params![name], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
        if exists {
            return Err(LibraryError::AlreadyExists(format!("show '{}'", name)));
        }

        conn.execute(
            "INSERT INTO shows (name, aliases, location, qualities, paused, air_by_date, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                name,
                serde_json::to_string(&show.aliases).map_err(json_err)?,
                show.location.to_string_lossy(),
                serde_json::to_string(&show.qualities).map_err(json_err)?,
                show.paused,
                show.air_by_date,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Self::load_show(&conn, conn.last_insert_rowid())
    }

    fn get_show(&self, id: i64) -> Result<Show, LibraryError> {
        let conn = self.conn.lock().unwrap();
        Self::load_show(&conn, id)
    }

    fn list_shows(&self) -> Result<Vec<Show>, LibraryError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM shows ORDER BY name COLLATE NOCASE",
            SHOW_COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_show)?;

        let mut shows = Vec::new();
        for row in rows {
            shows.push(row?);
        }
        Ok(shows)
    }

    fn find_show_by_name(&self, name: &str) -> Result<Option<Show>, LibraryError> {
        Ok(self
            .list_shows()?
            .into_iter()
            .find(|show| show.matches_name(name)))
    }

    fn set_show_paused(&self, id: i64, paused: bool) -> Result<Show, LibraryError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE shows SET paused = ? WHERE id = ?",
            params![paused, id],
        )?;
        if changed == 0 {
            return Err(LibraryError::NotFound(format!("show {}", id)));
        }
        Self::load_show(&conn, id)
    }

    fn delete_show(&self, id: i64) -> Result<Show, LibraryError> {
        let conn = self.conn.lock().unwrap();
        let show = Self::load_show(&conn, id)?;
        conn.execute("DELETE FROM shows WHERE id = ?", params![id])?;
        Ok(show)
    }

    fn upsert_episodes(&self, show_id: i64, episodes: &[NewEpisode]) -> Result<usize, LibraryError> {
        let mut conn = self.conn.lock().unwrap();
        Self::load_show(&conn, show_id)?;

        // same local calendar day the daily search uses
        let today = Local::now().date_naive();
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        let mut inserted = 0;

        for ep in episodes {
            let airdate = ep.airdate.map(date_str);
            let exists: bool = tx
                .query_row(
                    "SELECT 1 FROM episodes WHERE show_id = ? AND season = ? AND episode = ?",
                    params![show_id, ep.season, ep.episode],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);

            if exists {
                tx.execute(
                    "UPDATE episodes SET name = ?, airdate = ?, status = COALESCE(?, status), updated_at = ?
                     WHERE show_id = ? AND season = ? AND episode = ?",
                    params![
                        ep.name,
                        airdate,
                        ep.status.map(|s| s.as_str()),
                        now,
                        show_id,
                        ep.season,
                        ep.episode
                    ],
                )?;
            } else {
                let status = ep.status.unwrap_or(match ep.airdate {
                    Some(date) if date <= today => EpisodeStatus::Wanted,
                    _ => EpisodeStatus::Unaired,
                });
                tx.execute(
                    &format!(
                        "INSERT INTO episodes ({}) VALUES (?, ?, ?, ?, ?, ?, NULL, NULL, NULL, ?)",
                        EPISODE_COLUMNS
                    ),
                    params![show_id, ep.season, ep.episode, ep.name, airdate, status.as_str(), now],
                )?;
                inserted += 1;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn get_episode(&self, show_id: i64, season: u32, episode: u32) -> Result<Episode, LibraryError> {
        let conn = self.conn.lock().unwrap();
        Self::load_episode(&conn, show_id, season, episode)
    }

    fn list_episodes(&self, show_id: i64, season: Option<u32>) -> Result<Vec<Episode>, LibraryError> {
        let conn = self.conn.lock().unwrap();
        Self::load_show(&conn, show_id)?;

        match season {
            Some(season) => Self::query_episodes(
                &conn,
                &format!(
                    "SELECT {} FROM episodes WHERE show_id = ? AND season = ? ORDER BY season, episode",
                    EPISODE_COLUMNS
                ),
                params![show_id, season],
            ),
            None => Self::query_episodes(
                &conn,
                &format!(
                    "SELECT {} FROM episodes WHERE show_id = ? ORDER BY season, episode",
                    EPISODE_COLUMNS
                ),
                params![show_id],
            ),
        }
    }

    fn find_episode_by_airdate(
        &self,
        show_id: i64,
        airdate: NaiveDate,
    ) -> Result<Option<Episode>, LibraryError> {
        let conn = self.conn.lock().unwrap();
        let date = date_str(airdate);
        let episodes = Self::query_episodes(
            &conn,
            &format!(
                "SELECT {} FROM episodes WHERE show_id = ? AND airdate = ? ORDER BY season, episode LIMIT 1",
                EPISODE_COLUMNS
            ),
            params![show_id, date],
        )?;
        Ok(episodes.into_iter().next())
    }

    fn wanted_episodes(&self, show_id: i64, aired_before: NaiveDate) -> Result<Vec<Episode>, LibraryError> {
        let conn = self.conn.lock().unwrap();
        let date = date_str(aired_before);
        Self::query_episodes(
            &conn,
            &format!(
                "SELECT {} FROM episodes
                 WHERE show_id = ? AND status IN ('wanted', 'failed')
                   AND airdate IS NOT NULL AND airdate <= ?
                 ORDER BY season, episode",
                EPISODE_COLUMNS
            ),
            params![show_id, date],
        )
    }

    fn update_episode(
        &self,
        show_id: i64,
        season: u32,
        episode: u32,
        update: &EpisodeUpdate,
    ) -> Result<Episode, LibraryError> {
        let conn = self.conn.lock().unwrap();

        let changed = conn.execute(
            "UPDATE episodes SET
                status = COALESCE(?, status),
                quality = COALESCE(?, quality),
                location = COALESCE(?, location),
                release_name = COALESCE(?, release_name),
                updated_at = ?
             WHERE show_id = ? AND season = ? AND episode = ?",
            params![
                update.status.map(|s| s.as_str()),
                update.quality.map(|q| q.as_str()),
                update.location.as_ref().map(|p| p.to_string_lossy().into_owned()),
                update.release_name,
                Utc::now().to_rfc3339(),
                show_id,
                season,
                episode,
            ],
        )?;

        if changed == 0 {
            return Err(LibraryError::NotFound(format!(
                "show {} episode S{:02}E{:02}",
                show_id, season, episode
            )));
        }

        Self::load_episode(&conn, show_id, season, episode)
    }

    fn mark_aired(&self, today: NaiveDate) -> Result<usize, LibraryError> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute(
            "UPDATE episodes SET status = 'wanted', updated_at = ?
             WHERE status = 'unaired' AND airdate IS NOT NULL AND airdate <= ?",
            params![Utc::now().to_rfc3339(), date_str(today)],
        )?)
    }
}
