//! Provider cache statistics and clearing.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use medusa_core::CacheStats;

use super::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub provider: String,
    pub removed: u64,
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<CacheStats>, ApiError> {
    Ok(Json(state.cache().stats()?))
}

pub async fn clear_provider(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Json<ClearCacheResponse>, ApiError> {
    let removed = state.cache().clear(&provider)?;
    tracing::info!(provider = %provider, removed, "Cleared provider cache");
    Ok(Json(ClearCacheResponse { provider, removed }))
}
