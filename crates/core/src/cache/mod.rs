//! Provider result cache.
//!
//! Results returned by providers (RSS feeds and direct searches) are kept
//! for a few days so the daily search can match wanted episodes locally
//! instead of querying every indexer for every episode.

mod sqlite;

pub use sqlite::SqliteProviderCache;

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::library::Show;
use crate::provider::ProviderResult;
use crate::quality::Quality;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(e: rusqlite::Error) -> Self {
        CacheError::Database(e.to_string())
    }
}

/// A cached provider result with the details parsed from its name.
#[derive(Debug, Clone, Serialize)]
pub struct CachedResult {
    pub result: ProviderResult,
    pub quality: Quality,
    pub proper: bool,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub total: u64,
    pub by_provider: BTreeMap<String, u64>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

pub trait ProviderCache: Send + Sync {
    /// Upsert results keyed by `(provider, url)`. Results whose names can't
    /// be parsed as episode releases are skipped.
    ///
    /// Returns the number of new rows.
    fn store(&self, provider: &str, results: &[ProviderResult]) -> Result<u32, CacheError>;

    /// Cached releases of the show (by normalized name or alias) that contain
    /// the given episode.
    fn find(&self, show: &Show, season: u32, episode: u32)
        -> Result<Vec<CachedResult>, CacheError>;

    /// Cached releases of an air-by-date show for one air date.
    fn find_by_airdate(&self, show: &Show, date: NaiveDate)
        -> Result<Vec<CachedResult>, CacheError>;

    /// Delete rows last seen before `older_than`. Returns the number removed.
    fn trim(&self, older_than: DateTime<Utc>) -> Result<u64, CacheError>;

    fn clear(&self, provider: &str) -> Result<u64, CacheError>;

    fn stats(&self) -> Result<CacheStats, CacheError>;
}
