//! Search queue items.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::{today, SearchContext, SearchError};
use crate::history::HistoryEvent;
use crate::library::{EpisodeStatus, EpisodeUpdate, Show};
use crate::metrics;
use crate::queue::{QueueAction, QueueItemError};

/// Refresh provider feeds into the cache, then snatch wanted episodes found
/// there.
pub struct DailySearch {
    ctx: Arc<SearchContext>,
}

impl DailySearch {
    pub fn new(ctx: Arc<SearchContext>) -> Self {
        Self { ctx }
    }

    async fn refresh_cache(&self) {
        for provider in &self.ctx.providers {
            match provider.recent().await {
                Ok(results) => match self.ctx.cache.store(provider.name(), &results) {
                    Ok(added) => {
                        debug!(provider = provider.name(), results = results.len(), added, "Cached recent releases")
                    }
                    Err(e) => warn!(provider = provider.name(), error = %e, "Failed to cache recent releases"),
                },
                Err(e) => warn!(provider = provider.name(), error = %e, "Failed to fetch recent releases"),
            }
        }

        let retention = chrono::Duration::days(self.ctx.config.cache_retention_days as i64);
        match self.ctx.cache.trim(Utc::now() - retention) {
            Ok(removed) => metrics::CACHE_TRIMMED.inc_by(removed),
            Err(e) => warn!(error = %e, "Failed to trim provider cache"),
        }
    }

    async fn search_show(&self, show: &Show) -> Result<usize, SearchError> {
        let wanted = self.ctx.library.wanted_episodes(show.id, today())?;
        let mut snatched: HashSet<(u32, u32)> = HashSet::new();

        for episode in &wanted {
            if snatched.contains(&(episode.season, episode.episode)) {
                continue;
            }
            let results = self.ctx.search_cache(show, episode)?;
            metrics::SEARCH_RESULTS
                .with_label_values(&["daily"])
                .observe(results.len() as f64);

            match self.ctx.snatch_best(show, episode, &results, None).await {
                Ok(episodes) => {
                    snatched.extend(episodes.into_iter().map(|e| (episode.season, e)));
                }
                Err(e) => {
                    warn!(show = %show.name, season = episode.season, episode = episode.episode, error = %e, "Snatch failed")
                }
            }
        }
        Ok(snatched.len())
    }
}

#[async_trait]
impl QueueAction for DailySearch {
    fn name(&self) -> String {
        "Daily search".to_string()
    }

    fn kind(&self) -> &'static str {
        "daily_search"
    }

    fn dedup_key(&self) -> Option<String> {
        Some("daily".to_string())
    }

    async fn run(&self) -> Result<(), QueueItemError> {
        self.refresh_cache().await;

        let aired = self
            .ctx
            .library
            .mark_aired(today())
            .map_err(QueueItemError::new)?;
        if aired > 0 {
            info!(episodes = aired, "Newly aired episodes are now wanted");
        }

        let shows = self.ctx.library.list_shows().map_err(QueueItemError::new)?;
        let mut total = 0;
        for show in shows.iter().filter(|s| !s.paused) {
            match self.search_show(show).await {
                Ok(n) => total += n,
                Err(e) => warn!(show = %show.name, error = %e, "Daily search failed for show"),
            }
        }

        info!(snatched = total, "Daily search finished");
        Ok(())
    }
}

/// Search providers directly for every wanted, aired episode of one show.
pub struct BacklogSearch {
    ctx: Arc<SearchContext>,
    show_id: i64,
    show_name: String,
}

impl BacklogSearch {
    pub fn new(ctx: Arc<SearchContext>, show: &Show) -> Self {
        Self {
            ctx,
            show_id: show.id,
            show_name: show.name.clone(),
        }
    }
}

#[async_trait]
impl QueueAction for BacklogSearch {
    fn name(&self) -> String {
        format!("Backlog search: {}", self.show_name)
    }

    fn kind(&self) -> &'static str {
        "backlog_search"
    }

    fn dedup_key(&self) -> Option<String> {
        Some(format!("backlog:{}", self.show_id))
    }

    async fn run(&self) -> Result<(), QueueItemError> {
        let show = self
            .ctx
            .library
            .get_show(self.show_id)
            .map_err(QueueItemError::new)?;
        let wanted = self
            .ctx
            .library
            .wanted_episodes(show.id, today())
            .map_err(QueueItemError::new)?;

        let mut snatched: HashSet<(u32, u32)> = HashSet::new();
        for episode in &wanted {
            if snatched.contains(&(episode.season, episode.episode)) {
                continue;
            }
            let results = self.ctx.search_providers(&show, episode).await;
            metrics::SEARCH_RESULTS
                .with_label_values(&["backlog"])
                .observe(results.len() as f64);

            match self.ctx.snatch_best(&show, episode, &results, None).await {
                Ok(episodes) => snatched.extend(episodes.into_iter().map(|e| (episode.season, e))),
                Err(e) => {
                    warn!(show = %show.name, season = episode.season, episode = episode.episode, error = %e, "Snatch failed")
                }
            }
        }

        info!(show = %show.name, wanted = wanted.len(), snatched = snatched.len(), "Backlog search finished");
        Ok(())
    }
}

/// Search for one episode, whatever its status.
pub struct ManualSearch {
    ctx: Arc<SearchContext>,
    show_id: i64,
    season: u32,
    episode: u32,
}

impl ManualSearch {
    pub fn new(ctx: Arc<SearchContext>, show_id: i64, season: u32, episode: u32) -> Self {
        Self {
            ctx,
            show_id,
            season,
            episode,
        }
    }
}

#[async_trait]
impl QueueAction for ManualSearch {
    fn name(&self) -> String {
        format!(
            "Manual search: show {} S{:02}E{:02}",
            self.show_id, self.season, self.episode
        )
    }

    fn kind(&self) -> &'static str {
        "manual_search"
    }

    fn dedup_key(&self) -> Option<String> {
        Some(format!("manual:{}:{}:{}", self.show_id, self.season, self.episode))
    }

    async fn run(&self) -> Result<(), QueueItemError> {
        search_one(&self.ctx, self.show_id, self.season, self.episode, None, "manual").await
    }
}

/// Record a release as failed, then look for a different one.
pub struct FailedSearch {
    ctx: Arc<SearchContext>,
    show_id: i64,
    season: u32,
    episode: u32,
    /// Release to mark failed; defaults to the episode's last snatched release.
    release_name: Option<String>,
}

impl FailedSearch {
    pub fn new(
        ctx: Arc<SearchContext>,
        show_id: i64,
        season: u32,
        episode: u32,
        release_name: Option<String>,
    ) -> Self {
        Self {
            ctx,
            show_id,
            season,
            episode,
            release_name,
        }
    }
}

#[async_trait]
impl QueueAction for FailedSearch {
    fn name(&self) -> String {
        format!(
            "Retry failed: show {} S{:02}E{:02}",
            self.show_id, self.season, self.episode
        )
    }

    fn kind(&self) -> &'static str {
        "failed_search"
    }

    fn dedup_key(&self) -> Option<String> {
        Some(format!("failed:{}:{}:{}", self.show_id, self.season, self.episode))
    }

    async fn run(&self) -> Result<(), QueueItemError> {
        let episode = self
            .ctx
            .library
            .get_episode(self.show_id, self.season, self.episode)
            .map_err(QueueItemError::new)?;

        let release = self.release_name.clone().or(episode.release_name.clone());
        if let Some(release) = &release {
            info!(release = %release, "Marking release as failed");
            self.ctx
                .history
                .emit(HistoryEvent::DownloadFailed {
                    show_id: self.show_id,
                    season: self.season,
                    episode: self.episode,
                    release_name: release.clone(),
                })
                .await;
        }

        self.ctx
            .library
            .update_episode(
                self.show_id,
                self.season,
                self.episode,
                &EpisodeUpdate::status(EpisodeStatus::Failed),
            )
            .map_err(QueueItemError::new)?;

        search_one(
            &self.ctx,
            self.show_id,
            self.season,
            self.episode,
            release.as_deref(),
            "failed",
        )
        .await
    }
}

async fn search_one(
    ctx: &SearchContext,
    show_id: i64,
    season: u32,
    episode: u32,
    extra_failed: Option<&str>,
    label: &str,
) -> Result<(), QueueItemError> {
    let show = ctx.library.get_show(show_id).map_err(QueueItemError::new)?;
    let episode = ctx
        .library
        .get_episode(show_id, season, episode)
        .map_err(QueueItemError::new)?;

    let results = ctx.search_providers(&show, &episode).await;
    metrics::SEARCH_RESULTS
        .with_label_values(&[label])
        .observe(results.len() as f64);

    let snatched = ctx
        .snatch_best(&show, &episode, &results, extra_failed)
        .await
        .map_err(QueueItemError::new)?;

    if snatched.is_empty() {
        return Err(QueueItemError(format!(
            "no suitable release found for {} S{:02}E{:02}",
            show.name, episode.season, episode.episode
        )));
    }
    Ok(())
}
