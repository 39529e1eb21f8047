//! SQLite-backed provider cache.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, ToSql};

use super::{CacheError, CacheStats, CachedResult, ProviderCache};
use crate::library::Show;
use crate::naming::{normalize_show_name, parse_release_name};
use crate::provider::{ProviderResult, ResultKind};
use crate::quality::Quality;

const COLUMNS: &str = "provider, url, title, kind, size_bytes, seeders, leechers, published, \
                       quality, proper, first_seen_at, last_seen_at";

pub struct SqliteProviderCache {
    conn: Mutex<Connection>,
}

impl SqliteProviderCache {
    pub fn new(path: &Path) -> Result<Self, CacheError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CacheError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS provider_cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                provider TEXT NOT NULL,
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                kind TEXT NOT NULL,
                size_bytes INTEGER NOT NULL DEFAULT 0,
                seeders INTEGER,
                leechers INTEGER,
                published TEXT,
                -- parsed from the title
                series_name TEXT NOT NULL,
                season INTEGER,
                episodes TEXT NOT NULL,
                air_date TEXT,
                quality TEXT NOT NULL,
                proper INTEGER NOT NULL DEFAULT 0,
                first_seen_at TEXT NOT NULL,
                last_seen_at TEXT NOT NULL,
                UNIQUE(provider, url)
            );

            CREATE INDEX IF NOT EXISTS idx_provider_cache_series ON provider_cache(series_name, season);
            CREATE INDEX IF NOT EXISTS idx_provider_cache_last_seen ON provider_cache(last_seen_at);
            "#,
        )?;
        Ok(())
    }

    /// Run a `find` query restricted to the show's names plus `extra`.
    fn find_where(
        &self,
        show: &Show,
        extra: &str,
        extra_params: Vec<Box<dyn ToSql>>,
    ) -> Result<Vec<CachedResult>, CacheError> {
        let names = show.match_names();
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM provider_cache WHERE series_name IN ({}) AND {} \
             ORDER BY last_seen_at DESC",
            COLUMNS, placeholders, extra
        );

        let mut params: Vec<Box<dyn ToSql>> = names
            .into_iter()
            .map(|n| Box::new(n) as Box<dyn ToSql>)
            .collect();
        params.extend(extra_params);
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), row_to_cached)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn row_to_cached(row: &rusqlite::Row) -> rusqlite::Result<CachedResult> {
    let kind: String = row.get(3)?;
    let size: i64 = row.get(4)?;
    let published: Option<String> = row.get(7)?;
    let quality: String = row.get(8)?;
    let first_seen: String = row.get(10)?;
    let last_seen: String = row.get(11)?;

    Ok(CachedResult {
        result: ProviderResult {
            provider: row.get(0)?,
            url: row.get(1)?,
            title: row.get(2)?,
            kind: if kind == "nzb" {
                ResultKind::Nzb
            } else {
                ResultKind::Torrent
            },
            size_bytes: size.max(0) as u64,
            seeders: row.get(5)?,
            leechers: row.get(6)?,
            published: published.as_deref().and_then(parse_time),
        },
        quality: quality.parse().unwrap_or(Quality::Unknown),
        proper: row.get(9)?,
        first_seen_at: parse_time(&first_seen).unwrap_or_else(Utc::now),
        last_seen_at: parse_time(&last_seen).unwrap_or_else(Utc::now),
    })
}

/// `[1, 2]` -> `,1,2,` so a single episode can be matched with LIKE.
fn episodes_column(episodes: &[u32]) -> String {
    let joined = episodes
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!(",{},", joined)
}

impl ProviderCache for SqliteProviderCache {
    fn store(&self, provider: &str, results: &[ProviderResult]) -> Result<u32, CacheError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut added = 0u32;

        for result in results {
            let Some(parsed) = parse_release_name(&result.title) else {
                continue;
            };
            let series = normalize_show_name(&parsed.series_name);
            if series.is_empty() {
                continue;
            }

            let exists: bool = tx
                .query_row(
                    "SELECT 1 FROM provider_cache WHERE provider = ?1 AND url = ?2",
                    params![provider, result.url],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);

            if exists {
                tx.execute(
                    "UPDATE provider_cache SET seeders = ?1, leechers = ?2, last_seen_at = ?3 \
                     WHERE provider = ?4 AND url = ?5",
                    params![result.seeders, result.leechers, now, provider, result.url],
                )?;
                continue;
            }

            tx.execute(
                "INSERT INTO provider_cache (provider, url, title, kind, size_bytes, seeders, \
                 leechers, published, series_name, season, episodes, air_date, quality, proper, \
                 first_seen_at, last_seen_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
                params![
                    provider,
                    result.url,
                    result.title,
                    result.kind.as_str(),
                    result.size_bytes as i64,
                    result.seeders,
                    result.leechers,
                    result.published.map(|p| p.to_rfc3339()),
                    series,
                    parsed.season,
                    episodes_column(&parsed.episodes),
                    parsed.air_date.map(|d| d.format("%Y-%m-%d").to_string()),
                    parsed.quality.as_str(),
                    parsed.proper,
                    now,
                ],
            )?;
            added += 1;
        }

        tx.commit()?;
        Ok(added)
    }

    fn find(
        &self,
        show: &Show,
        season: u32,
        episode: u32,
    ) -> Result<Vec<CachedResult>, CacheError> {
        self.find_where(
            show,
            "season = ? AND episodes LIKE ?",
            vec![
                Box::new(season) as Box<dyn ToSql>,
                Box::new(format!("%,{},%", episode)),
            ],
        )
    }

    fn find_by_airdate(
        &self,
        show: &Show,
        date: NaiveDate,
    ) -> Result<Vec<CachedResult>, CacheError> {
        self.find_where(
            show,
            "air_date = ?",
            vec![Box::new(date.format("%Y-%m-%d").to_string()) as Box<dyn ToSql>],
        )
    }

    fn trim(&self, older_than: DateTime<Utc>) -> Result<u64, CacheError> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM provider_cache WHERE last_seen_at < ?1",
            params![older_than.to_rfc3339()],
        )?;
        Ok(removed as u64)
    }

    fn clear(&self, provider: &str) -> Result<u64, CacheError> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM provider_cache WHERE provider = ?1",
            params![provider],
        )?;
        Ok(removed as u64)
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt =
            conn.prepare("SELECT provider, COUNT(*) FROM provider_cache GROUP BY provider")?;
        let by_provider = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<std::collections::BTreeMap<_, _>, _>>()?;

        let (oldest, newest): (Option<String>, Option<String>) = conn.query_row(
            "SELECT MIN(first_seen_at), MAX(last_seen_at) FROM provider_cache",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(CacheStats {
            total: by_provider.values().sum(),
            by_provider,
            oldest: oldest.as_deref().and_then(parse_time),
            newest: newest.as_deref().and_then(parse_time),
        })
    }
}
