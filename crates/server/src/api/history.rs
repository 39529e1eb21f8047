use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use medusa_core::{HistoryFilter, HistoryRecord};

use super::error::ApiError;
use crate::state::AppState;

/// Maximum allowed limit for history queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for history queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for the history endpoint
#[derive(Debug, Deserialize)]
pub struct HistoryQueryParams {
    /// Filter by event type (`snatched`, `downloaded`, ...)
    pub event_type: Option<String>,
    pub show_id: Option<i64>,
    /// Filter events after this timestamp (ISO 8601)
    pub from: Option<DateTime<Utc>>,
    /// Filter events before this timestamp (ISO 8601)
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of events to return (default 100, max 1000)
    pub limit: Option<i64>,
    /// Pagination offset (default 0)
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryQueryResponse {
    pub events: Vec<HistoryRecord>,
    /// Total number of matching events
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Query history events, newest first
pub async fn query_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryQueryParams>,
) -> Result<Json<HistoryQueryResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = HistoryFilter::new().with_time_range(params.from, params.to);
    if let Some(event_type) = params.event_type {
        filter = filter.with_event_type(event_type);
    }
    if let Some(show_id) = params.show_id {
        filter = filter.with_show_id(show_id);
    }

    let total = state.history_store().count(&filter)?;
    let events = state
        .history_store()
        .query(&filter.with_limit(limit).with_offset(offset))?;

    Ok(Json(HistoryQueryResponse {
        events,
        total,
        limit,
        offset,
    }))
}
