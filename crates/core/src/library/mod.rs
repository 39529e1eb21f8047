//! The library: shows, their episodes and the state of each episode.

mod sqlite;
mod types;

pub use sqlite::{SqliteLibraryStore, SCHEMA_VERSION};
pub use types::*;

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: i64, supported: i64 },

    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for LibraryError {
    fn from(e: rusqlite::Error) -> Self {
        LibraryError::Database(e.to_string())
    }
}

/// Persistent storage for shows and episodes.
pub trait LibraryStore: Send + Sync {
    fn add_show(&self, show: &NewShow) -> Result<Show, LibraryError>;

    fn get_show(&self, id: i64) -> Result<Show, LibraryError>;

    /// All shows ordered by name.
    fn list_shows(&self) -> Result<Vec<Show>, LibraryError>;

    /// Match by normalized name or alias.
    fn find_show_by_name(&self, name: &str) -> Result<Option<Show>, LibraryError>;

    fn set_show_paused(&self, id: i64, paused: bool) -> Result<Show, LibraryError>;

    /// Remove the show and all of its episodes.
    fn delete_show(&self, id: i64) -> Result<Show, LibraryError>;

    /// Insert new episodes or refresh name/airdate of existing ones.
    /// Returns the number of episodes inserted.
    fn upsert_episodes(&self, show_id: i64, episodes: &[NewEpisode]) -> Result<usize, LibraryError>;

    fn get_episode(&self, show_id: i64, season: u32, episode: u32) -> Result<Episode, LibraryError>;

    /// Episodes ordered by season and number, optionally for one season.
    fn list_episodes(&self, show_id: i64, season: Option<u32>) -> Result<Vec<Episode>, LibraryError>;

    fn find_episode_by_airdate(
        &self,
        show_id: i64,
        airdate: NaiveDate,
    ) -> Result<Option<Episode>, LibraryError>;

    /// `Wanted` or `Failed` episodes that aired on or before `aired_before`.
    fn wanted_episodes(&self, show_id: i64, aired_before: NaiveDate) -> Result<Vec<Episode>, LibraryError>;

    fn update_episode(
        &self,
        show_id: i64,
        season: u32,
        episode: u32,
        update: &EpisodeUpdate,
    ) -> Result<Episode, LibraryError>;

    /// Flip `Unaired` episodes whose airdate is on or before `today` to
    /// `Wanted`. Returns how many changed.
    fn mark_aired(&self, today: NaiveDate) -> Result<usize, LibraryError>;
}
