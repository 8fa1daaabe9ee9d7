use axum::Json;
use axum::extract::{Path, State};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::ProgressResponse;
use crate::state::AppState;

pub async fn progress(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<ProgressResponse>, ApiError> {
    state.tasks.evict_expired();

    let snapshot = state
        .tasks
        .snapshot(&task_id)
        .ok_or_else(|| ApiError::UnknownTask(task_id.clone()))?;
    tracing::trace!(task_id = %task_id, progress = snapshot.progress, age = ?snapshot.age, "progress polled");

    Ok(Json(ProgressResponse::from(snapshot)))
}
