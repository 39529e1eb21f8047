//! Show and episode API handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use medusa_core::search::{BacklogSearch, FailedSearch, ManualSearch};
use medusa_core::{
    Episode, EpisodeUpdate, HistoryEvent, NewEpisode, NewShow, Priority, Show,
};

use super::error::ApiError;
use super::middleware::AuthUser;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// A show with a count of its episodes per status.
#[derive(Debug, Serialize)]
pub struct ShowResponse {
    #[serde(flatten)]
    pub show: Show,
    pub episode_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Deserialize)]
pub struct ListEpisodesParams {
    pub season: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct UpsertEpisodesResponse {
    pub inserted: usize,
    pub updated: usize,
}

/// Optional body for retrying a failed download.
#[derive(Debug, Default, Deserialize)]
pub struct RetryBody {
    /// Release to mark failed; defaults to the episode's last snatched release.
    pub release_name: Option<String>,
}

/// Returned when work is handed to a queue.
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queue: String,
    pub item_id: Uuid,
}

// ============================================================================
// Shows
// ============================================================================

pub async fn list_shows(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Show>>, ApiError> {
    Ok(Json(state.library().list_shows()?))
}

pub async fn add_show(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(body): Json<NewShow>,
) -> Result<(StatusCode, Json<Show>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::bad_request("show name cannot be empty"));
    }

    let show = state.library().add_show(&body)?;
    state.history().try_emit(HistoryEvent::ShowAdded {
        show_id: show.id,
        name: show.name.clone(),
    });
    tracing::info!(show_id = show.id, name = %show.name, by = %user, "Show added");

    Ok((StatusCode::CREATED, Json(show)))
}

pub async fn get_show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ShowResponse>, ApiError> {
    let show = state.library().get_show(id)?;
    let mut episode_counts = BTreeMap::new();
    for episode in state.library().list_episodes(id, None)? {
        *episode_counts
            .entry(episode.status.to_string())
            .or_insert(0) += 1;
    }
    Ok(Json(ShowResponse {
        show,
        episode_counts,
    }))
}

pub async fn delete_show(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Show>, ApiError> {
    let show = state.library().delete_show(id)?;
    state.history().try_emit(HistoryEvent::ShowRemoved {
        show_id: show.id,
        name: show.name.clone(),
    });
    tracing::info!(show_id = show.id, name = %show.name, by = %user, "Show removed");
    Ok(Json(show))
}

pub async fn pause_show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Show>, ApiError> {
    Ok(Json(state.library().set_show_paused(id, true)?))
}

pub async fn resume_show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Show>, ApiError> {
    Ok(Json(state.library().set_show_paused(id, false)?))
}

// ============================================================================
// Episodes
// ============================================================================

pub async fn list_episodes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<ListEpisodesParams>,
) -> Result<Json<Vec<Episode>>, ApiError> {
    state.library().get_show(id)?;
    Ok(Json(state.library().list_episodes(id, params.season)?))
}

pub async fn upsert_episodes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(episodes): Json<Vec<NewEpisode>>,
) -> Result<Json<UpsertEpisodesResponse>, ApiError> {
    state.library().get_show(id)?;
    if episodes.iter().any(|e| e.episode == 0) {
        return Err(ApiError::bad_request("episode numbers start at 1"));
    }

    let inserted = state.library().upsert_episodes(id, &episodes)?;
    Ok(Json(UpsertEpisodesResponse {
        inserted,
        updated: episodes.len() - inserted,
    }))
}

pub async fn update_episode(
    State(state): State<Arc<AppState>>,
    Path((id, season, episode)): Path<(i64, u32, u32)>,
    Json(update): Json<EpisodeUpdate>,
) -> Result<Json<Episode>, ApiError> {
    if update.status.is_none()
        && update.quality.is_none()
        && update.location.is_none()
        && update.release_name.is_none()
    {
        return Err(ApiError::bad_request("nothing to update"));
    }
    Ok(Json(
        state
            .library()
            .update_episode(id, season, episode, &update)?,
    ))
}

// ============================================================================
// Searches
// ============================================================================

pub async fn search_episode(
    State(state): State<Arc<AppState>>,
    Path((id, season, episode)): Path<(i64, u32, u32)>,
) -> Result<(StatusCode, Json<QueuedResponse>), ApiError> {
    state.library().get_episode(id, season, episode)?;

    let action = ManualSearch::new(Arc::clone(state.search()), id, season, episode);
    let item_id = state
        .search_queue()
        .add_item(Arc::new(action), Priority::High)?;
    Ok(queued(state.search_queue().name(), item_id))
}

pub async fn retry_episode(
    State(state): State<Arc<AppState>>,
    Path((id, season, episode)): Path<(i64, u32, u32)>,
    body: Bytes,
) -> Result<(StatusCode, Json<QueuedResponse>), ApiError> {
    let body: RetryBody = if body.is_empty() {
        RetryBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("invalid body: {}", e)))?
    };

    state.library().get_episode(id, season, episode)?;

    let action = FailedSearch::new(
        Arc::clone(state.search()),
        id,
        season,
        episode,
        body.release_name,
    );
    let item_id = state
        .search_queue()
        .add_item(Arc::new(action), Priority::High)?;
    Ok(queued(state.search_queue().name(), item_id))
}

pub async fn backlog_search(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<QueuedResponse>), ApiError> {
    let show = state.library().get_show(id)?;

    let action = BacklogSearch::new(Arc::clone(state.search()), &show);
    let item_id = state
        .search_queue()
        .add_item(Arc::new(action), Priority::Low)?;
    Ok(queued(state.search_queue().name(), item_id))
}

fn queued(queue: &str, item_id: Uuid) -> (StatusCode, Json<QueuedResponse>) {
    (
        StatusCode::ACCEPTED,
        Json(QueuedResponse {
            queue: queue.to_string(),
            item_id,
        }),
    )
}
