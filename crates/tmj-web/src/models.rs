use serde::Serialize;

use tmj_core::{SectionNumbers, TaskSnapshot, TaskStatus};

/// Successful `/upload` body: one key per section plus the task id.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub sections: SectionNumbers,
    pub task_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub progress: f64,
    /// Empty until the first section starts.
    pub current_section: String,
    pub status: TaskStatus,
    pub task_id: String,
}

impl From<TaskSnapshot> for ProgressResponse {
    fn from(snapshot: TaskSnapshot) -> Self {
        Self {
            progress: snapshot.progress,
            current_section: snapshot
                .current_section
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            status: snapshot.status,
            task_id: snapshot.task_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub status: &'static str,
    pub task_id: String,
}

pub const CANCELLED_MESSAGE: &str = "Processing cancelled by user";
