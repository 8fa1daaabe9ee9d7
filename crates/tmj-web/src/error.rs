use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use tmj_core::TaskError;

use crate::models::ErrorResponse;

/// Errors surfaced to HTTP clients as `{"error": ...}` bodies.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Rejected upload; no task is created.
    #[error("{0}")]
    BadRequest(String),

    /// Task id expired or never existed.
    #[error("Invalid task ID")]
    UnknownTask(String),

    /// The document could not be opened; no partial results.
    #[error("Error processing PDF: {message}")]
    Document { task_id: String, message: String },

    #[error("{0}")]
    Internal(String),
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, task_id) = match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            ApiError::UnknownTask(_) => (StatusCode::NOT_FOUND, None),
            ApiError::Document { task_id, .. } => (StatusCode::UNPROCESSABLE_ENTITY, Some(task_id)),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        (
            status,
            Json(ErrorResponse {
                error: message,
                task_id,
            }),
        )
            .into_response()
    }
}
