use axum::Json;
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use tmj_core::{ProgressEvent, TaskStatus};
use tmj_parsing::{ProcessError, ProcessOutcome};

use crate::error::ApiError;
use crate::models::{CANCELLED_MESSAGE, ErrorResponse, UploadResponse};
use crate::state::AppState;
use crate::upload::{self, UploadedFile};

/// Accept a journal PDF and extract its numbers before responding.
///
/// Processing runs to completion (or cancellation) within this request, on a
/// blocking thread. The task id is registered first so `/progress` and
/// `/cancel` can reach it meanwhile.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    state.tasks.evict_expired();

    let fields =
        upload::parse_multipart(multipart, state.max_upload_mb, state.max_upload_bytes()).await?;

    let (task_id, cancel) = match fields.task_id.as_deref() {
        Some(id) => state.tasks.create_with_id(id)?,
        None => state.tasks.create(),
    };

    tracing::info!(
        task_id = %task_id,
        filename = %fields.file.filename,
        bytes = fields.file.data.len(),
        "processing upload"
    );

    let result = run_extraction(state.clone(), task_id.clone(), fields.file, cancel).await;

    match result {
        Ok(Ok(ProcessOutcome::Completed(sections))) => {
            state.tasks.finish(&task_id, TaskStatus::Completed);
            tracing::info!(task_id = %task_id, numbers = sections.total(), "upload processed");
            Ok(Json(UploadResponse { sections, task_id }).into_response())
        }
        Ok(Ok(ProcessOutcome::Cancelled)) => {
            state.tasks.finish(&task_id, TaskStatus::Cancelled);
            Ok(Json(ErrorResponse {
                error: CANCELLED_MESSAGE.to_string(),
                task_id: Some(task_id),
            })
            .into_response())
        }
        Ok(Err(ProcessError::Open(e))) => {
            state.tasks.finish(&task_id, TaskStatus::Completed);
            tracing::error!(task_id = %task_id, error = %e, "PDF processing failed");
            Err(ApiError::Document {
                task_id,
                message: e.to_string(),
            })
        }
        Err(e) => {
            state.tasks.finish(&task_id, TaskStatus::Completed);
            tracing::error!(task_id = %task_id, error = %e, "upload handling failed");
            Err(e)
        }
    }
}

/// Write the upload to a temp dir and run the processor on a blocking thread
/// (MuPDF is not async). Progress events are mirrored into the task store.
async fn run_extraction(
    state: Arc<AppState>,
    task_id: String,
    file: UploadedFile,
    cancel: CancellationToken,
) -> Result<Result<ProcessOutcome, ProcessError>, ApiError> {
    tokio::task::spawn_blocking(move || {
        // Temp dir (auto-cleaned on drop) outlives processing.
        let temp_dir = tempfile::tempdir()
            .map_err(|e| ApiError::Internal(format!("Failed to create temp directory: {}", e)))?;
        let pdf_path = temp_dir.path().join("upload.pdf");
        std::fs::write(&pdf_path, &file.data)
            .map_err(|e| ApiError::Internal(format!("Failed to write temp file: {}", e)))?;
        drop(file);

        let tasks = state.tasks.clone();
        let on_progress = |event: ProgressEvent| match event {
            ProgressEvent::SectionStarted { section } => tasks.set_section(&task_id, section),
            ProgressEvent::PageProcessed { .. } => {
                if let Some(percent) = event.percent() {
                    tasks.set_progress(&task_id, percent);
                }
            }
        };

        Ok(tmj_parsing::process_document(
            &pdf_path,
            state.backend.as_ref(),
            &state.extractor,
            on_progress,
            &cancel,
        ))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Task join error: {}", e)))?
}
