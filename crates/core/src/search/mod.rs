//! Finding and snatching releases for wanted episodes.
//!
//! Searches run as queue items on the search queue:
//! - [`DailySearch`]: refresh provider feeds into the cache and match wanted
//!   episodes against it
//! - [`BacklogSearch`]: query providers directly for every wanted episode of
//!   a show
//! - [`ManualSearch`] / [`FailedSearch`]: one episode, on request

mod actions;
mod schedulers;
mod selection;

pub use actions::{BacklogSearch, DailySearch, FailedSearch, ManualSearch};
pub use schedulers::{BacklogScheduler, DailySearchScheduler};
pub use selection::{pick_best_result, CandidateRelease};

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheError, ProviderCache};
use crate::client::{client_for, ClientError, DownloadClient};
use crate::config::SearchConfig;
use crate::history::{HistoryError, HistoryEvent, HistoryHandle, HistoryStore};
use crate::library::{Episode, EpisodeStatus, EpisodeUpdate, LibraryError, LibraryStore, Show};
use crate::metrics;
use crate::naming::parse_release_name;
use crate::provider::{Provider, ProviderResult, SearchRequest};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("library error: {0}")]
    Library(#[from] LibraryError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("history error: {0}")]
    History(#[from] HistoryError),

    #[error("download client error: {0}")]
    Client(#[from] ClientError),

    #[error("no download client configured for {0} results")]
    NoClient(&'static str),
}

/// Everything a search needs.
pub struct SearchContext {
    pub library: Arc<dyn LibraryStore>,
    pub providers: Vec<Arc<dyn Provider>>,
    pub cache: Arc<dyn ProviderCache>,
    pub clients: Vec<Arc<dyn DownloadClient>>,
    pub history: HistoryHandle,
    /// Read side of history, for failed-release lookups.
    pub history_store: Arc<dyn HistoryStore>,
    pub config: SearchConfig,
}

impl SearchContext {
    /// Release names among `results` that are recorded as failed.
    pub fn failed_releases(
        &self,
        results: &[ProviderResult],
    ) -> Result<HashSet<String>, SearchError> {
        let mut failed = HashSet::new();
        for result in results {
            let name = parse_release_name(&result.title)
                .map(|p| p.release_name)
                .unwrap_or_else(|| result.title.clone());
            if self.history_store.is_failed_release(&name)? {
                failed.insert(name.to_lowercase());
            }
        }
        Ok(failed)
    }

    /// Send the release to a client and mark the episodes snatched.
    pub async fn snatch(
        &self,
        show: &Show,
        season: u32,
        episodes: &[u32],
        candidate: &CandidateRelease,
    ) -> Result<(), SearchError> {
        let kind = candidate.result.kind;
        let client = client_for(&self.clients, kind).ok_or(SearchError::NoClient(kind.as_str()))?;

        if let Err(e) = client.snatch(&candidate.result).await {
            metrics::SNATCHES_TOTAL
                .with_label_values(&[client.name(), "error"])
                .inc();
            return Err(e.into());
        }
        metrics::SNATCHES_TOTAL
            .with_label_values(&[client.name(), "success"])
            .inc();

        let status = if candidate.parsed.proper {
            EpisodeStatus::SnatchedProper
        } else {
            EpisodeStatus::Snatched
        };
        let update = EpisodeUpdate::status(status)
            .with_quality(candidate.parsed.quality)
            .with_release_name(candidate.parsed.release_name.clone());

        for &episode in episodes {
            if let Err(e) = self.library.update_episode(show.id, season, episode, &update) {
                warn!(show = %show.name, season, episode, error = %e, "Failed to mark episode snatched");
            }
        }

        info!(
            show = %show.name,
            season,
            ?episodes,
            release = %candidate.result.title,
            client = client.name(),
            "Snatched release"
        );

        self.history
            .emit(HistoryEvent::Snatched {
                show_id: show.id,
                season,
                episodes: episodes.to_vec(),
                release_name: candidate.parsed.release_name.clone(),
                provider: candidate.result.provider.clone(),
                quality: candidate.parsed.quality.as_str().to_string(),
                client: client.name().to_string(),
            })
            .await;

        Ok(())
    }

    /// Query every provider for one episode, caching what comes back.
    /// Provider failures are logged and skipped.
    pub async fn search_providers(&self, show: &Show, episode: &Episode) -> Vec<ProviderResult> {
        let request = match (show.air_by_date, episode.airdate) {
            (true, Some(date)) => SearchRequest::air_date(&show.name, date),
            _ => SearchRequest::episode(&show.name, episode.season, episode.episode),
        };

        let mut all = Vec::new();
        for provider in &self.providers {
            match provider.search(&request).await {
                Ok(results) => {
                    debug!(provider = provider.name(), results = results.len(), query = %request.query_string(), "Provider search complete");
                    if let Err(e) = self.cache.store(provider.name(), &results) {
                        warn!(provider = provider.name(), error = %e, "Failed to cache results");
                    }
                    all.extend(results);
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Provider search failed");
                }
            }
        }
        all
    }

    /// Cached results for one episode.
    pub fn search_cache(&self, show: &Show, episode: &Episode) -> Result<Vec<ProviderResult>, SearchError> {
        let cached = match (show.air_by_date, episode.airdate) {
            (true, Some(date)) => self.cache.find_by_airdate(show, date)?,
            _ => self.cache.find(show, episode.season, episode.episode)?,
        };
        Ok(cached.into_iter().map(|c| c.result).collect())
    }

    /// Pick the best of `results` for `episode` and snatch it. Returns the
    /// episode numbers that were snatched (empty if nothing suitable).
    pub async fn snatch_best(
        &self,
        show: &Show,
        episode: &Episode,
        results: &[ProviderResult],
        extra_failed: Option<&str>,
    ) -> Result<Vec<u32>, SearchError> {
        let matching: Vec<ProviderResult> = results
            .iter()
            .filter(|r| covers_episode(show, episode, &r.title))
            .cloned()
            .collect();

        let mut failed = self.failed_releases(&matching)?;
        if let Some(name) = extra_failed {
            failed.insert(name.to_lowercase());
        }

        let Some(candidate) = pick_best_result(show, &matching, &self.config, &failed) else {
            debug!(show = %show.name, season = episode.season, episode = episode.episode, candidates = matching.len(), "No suitable release");
            return Ok(Vec::new());
        };

        let episodes = self.episodes_in_release(show, episode, &candidate)?;
        self.snatch(show, episode.season, &episodes, &candidate).await?;
        Ok(episodes)
    }

    /// Library episodes a release contains; always includes `episode`.
    fn episodes_in_release(
        &self,
        show: &Show,
        episode: &Episode,
        candidate: &CandidateRelease,
    ) -> Result<Vec<u32>, SearchError> {
        if candidate.parsed.is_air_by_date() || candidate.parsed.episodes.len() <= 1 {
            return Ok(vec![episode.episode]);
        }

        let known: HashSet<u32> = self
            .library
            .list_episodes(show.id, Some(episode.season))?
            .into_iter()
            .map(|e| e.episode)
            .collect();

        let mut episodes: Vec<u32> = candidate
            .parsed
            .episodes
            .iter()
            .copied()
            .filter(|e| known.contains(e))
            .collect();
        if !episodes.contains(&episode.episode) {
            episodes.push(episode.episode);
            episodes.sort_unstable();
        }
        Ok(episodes)
    }
}

/// Whether a release title is for this show and contains this episode.
pub fn covers_episode(show: &Show, episode: &Episode, title: &str) -> bool {
    let Some(parsed) = parse_release_name(title) else {
        return false;
    };
    if !show.matches_name(&parsed.series_name) {
        return false;
    }
    match (show.air_by_date, episode.airdate, parsed.air_date) {
        (true, Some(wanted), Some(date)) => wanted == date,
        _ => parsed.season == Some(episode.season) && parsed.episodes.contains(&episode.episode),
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
