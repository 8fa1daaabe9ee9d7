use std::sync::Arc;

use tmj_core::{PdfBackend, TaskStore};
use tmj_parsing::SectionExtractor;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub tasks: Arc<TaskStore>,
    pub extractor: SectionExtractor,
    pub backend: Arc<dyn PdfBackend>,
    /// Largest accepted upload, in MiB.
    pub max_upload_mb: u64,
}

impl AppState {
    pub fn max_upload_bytes(&self) -> usize {
        usize::try_from(self.max_upload_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }
}
