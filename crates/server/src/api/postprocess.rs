use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use medusa_core::postprocess::PostProcessItem;
use medusa_core::Priority;

use super::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PostProcessBody {
    /// Directory to process; defaults to `post_processing.download_dir`.
    pub dir: Option<PathBuf>,
    /// Replace existing files even when they are of equal or better quality.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct PostProcessQueuedResponse {
    pub queue: String,
    pub item_id: Uuid,
    pub dir: PathBuf,
}

pub async fn post_process(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PostProcessBody>,
) -> Result<(StatusCode, Json<PostProcessQueuedResponse>), ApiError> {
    let dir = body
        .dir
        .or_else(|| state.postprocessor().download_dir().map(|d| d.to_path_buf()))
        .ok_or_else(|| ApiError::bad_request("no directory given and no download_dir configured"))?;

    if !dir.is_dir() {
        return Err(ApiError::bad_request(format!(
            "not a directory: {}",
            dir.display()
        )));
    }

    let item = PostProcessItem::new(Arc::clone(state.postprocessor()), dir.clone(), body.force);
    let item_id = state
        .postprocess_queue()
        .add_item(Arc::new(item), Priority::High)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(PostProcessQueuedResponse {
            queue: state.postprocess_queue().name().to_string(),
            item_id,
            dir,
        }),
    ))
}
