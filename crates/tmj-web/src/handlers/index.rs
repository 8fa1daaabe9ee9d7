use axum::extract::State;
use std::sync::Arc;

use crate::state::AppState;

/// Liveness probe.
pub async fn index(State(state): State<Arc<AppState>>) -> &'static str {
    state.tasks.evict_expired();
    "PDF Number Extractor API is running"
}
