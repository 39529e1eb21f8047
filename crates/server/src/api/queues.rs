//! Queue inspection and control.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use medusa_core::{GenericQueue, QueueItemInfo, QueueStatus};

use super::error::ApiError;
use crate::state::AppState;

/// Full view of one queue.
#[derive(Debug, Serialize)]
pub struct QueueDetailResponse {
    #[serde(flatten)]
    pub status: QueueStatus,
    /// Waiting items in the order they will run.
    pub items: Vec<QueueItemInfo>,
    /// Recently finished items, newest first.
    pub recent: Vec<QueueItemInfo>,
}

fn find_queue<'a>(state: &'a AppState, name: &str) -> Result<&'a Arc<GenericQueue>, ApiError> {
    state
        .queue(name)
        .ok_or_else(|| ApiError::not_found(format!("queue not found: {}", name)))
}

pub async fn list_queues(State(state): State<Arc<AppState>>) -> Json<Vec<QueueStatus>> {
    Json(state.queues().iter().map(|q| q.status()).collect())
}

pub async fn get_queue(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<QueueDetailResponse>, ApiError> {
    let queue = find_queue(&state, &name)?;
    Ok(Json(QueueDetailResponse {
        status: queue.status(),
        items: queue.queued(),
        recent: queue.history(),
    }))
}

pub async fn pause_queue(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<QueueStatus>, ApiError> {
    let queue = find_queue(&state, &name)?;
    queue.pause();
    Ok(Json(queue.status()))
}

pub async fn resume_queue(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<QueueStatus>, ApiError> {
    let queue = find_queue(&state, &name)?;
    queue.unpause();
    Ok(Json(queue.status()))
}

pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    Path((name, id)): Path<(String, Uuid)>,
) -> Result<Json<QueueItemInfo>, ApiError> {
    let queue = find_queue(&state, &name)?;
    Ok(Json(queue.remove(id)?))
}
