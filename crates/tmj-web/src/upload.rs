use axum::extract::Multipart;
use axum::http::StatusCode;

use crate::error::ApiError;

/// Multipart field carrying the journal PDF.
pub const FILE_FIELD: &str = "pdf_file";

/// Optional multipart field with a client-generated task id (UUID), so the
/// client can poll `/progress` and `/cancel` while `/upload` is still running.
pub const TASK_ID_FIELD: &str = "task_id";

/// An uploaded file with its data and metadata.
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Parsed form fields from the multipart upload.
pub struct FormFields {
    pub file: UploadedFile,
    pub task_id: Option<String>,
}

/// Parse a multipart form upload into structured form fields.
///
/// Rejections come back as [`ApiError::BadRequest`], checked in order:
/// missing file, non-PDF filename, oversize file.
pub async fn parse_multipart(
    mut multipart: Multipart,
    max_upload_mb: u64,
    max_upload_bytes: usize,
) -> Result<FormFields, ApiError> {
    let mut file: Option<UploadedFile> = None;
    let mut task_id: Option<String> = None;
    // Set when the body limit cut the file short; reported after the filename check.
    let mut truncated = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            FILE_FIELD => {
                let filename = field.file_name().unwrap_or("").to_string();
                let data = match field.bytes().await {
                    Ok(bytes) => bytes.to_vec(),
                    Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                        truncated = true;
                        Vec::new()
                    }
                    Err(e) => {
                        return Err(ApiError::BadRequest(format!(
                            "Failed to read file data: {}",
                            e
                        )));
                    }
                };
                file = Some(UploadedFile { filename, data });
                if truncated {
                    break;
                }
            }
            TASK_ID_FIELD => {
                let val = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read task_id: {}", e)))?;
                if !val.trim().is_empty() {
                    task_id = Some(val);
                }
            }
            _ => {
                // Unknown fields are drained and dropped.
                field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read form field {name}: {e}"))
                })?;
            }
        }
    }

    let file = file.ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;

    if !is_pdf_filename(&file.filename) {
        return Err(ApiError::BadRequest(
            "Only PDF files are allowed".to_string(),
        ));
    }
    if truncated || file.data.len() > max_upload_bytes {
        return Err(ApiError::BadRequest(format!(
            "File size exceeds {max_upload_mb}MB limit"
        )));
    }

    Ok(FormFields { file, task_id })
}

fn is_pdf_filename(filename: &str) -> bool {
    filename.to_lowercase().ends_with(".pdf")
}
