use axum::Json;
use axum::extract::{Path, State};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::CancelResponse;
use crate::state::AppState;

pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    state.tasks.evict_expired();

    if !state.tasks.cancel(&task_id) {
        return Err(ApiError::UnknownTask(task_id));
    }

    Ok(Json(CancelResponse {
        status: "cancellation_requested",
        task_id,
    }))
}
