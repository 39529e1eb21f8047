use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use medusa_core::SchedulerStatus;

use super::error::ApiError;
use crate::state::AppState;

pub async fn list_schedulers(State(state): State<Arc<AppState>>) -> Json<Vec<SchedulerStatus>> {
    Json(state.schedulers().list())
}

/// Ask a scheduler to run on its next tick.
pub async fn run_scheduler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<(StatusCode, Json<SchedulerStatus>), ApiError> {
    let scheduler = state
        .schedulers()
        .get(&name)
        .ok_or_else(|| ApiError::not_found(format!("scheduler not found: {}", name)))?;

    scheduler.force_run();
    tracing::info!(scheduler = %name, "Forced scheduler run");
    Ok((StatusCode::ACCEPTED, Json(scheduler.status())))
}
