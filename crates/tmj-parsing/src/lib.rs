use std::path::Path;

use tokio_util::sync::CancellationToken;

pub mod config;
pub mod extractor;
pub mod processor;

pub use config::{DEFAULT_MIN_DIGITS, ExtractorConfig, ExtractorConfigBuilder, ExtractorConfigError};
pub use extractor::SectionExtractor;
pub use processor::{ProcessError, ProcessOutcome, process_document, process_pages};
// Re-export domain types from core (canonical definitions live there)
pub use tmj_core::{BackendError, PageSource, PdfBackend, ProgressEvent, Section, SectionNumbers};

/// Extract every section's numbers from a PDF file with the built-in patterns.
///
/// Pipeline:
/// 1. Open the PDF via `backend`
/// 2. For each section, scan every page's text with its marker/number rules
/// 3. Deduplicate each section's numbers across the document
pub fn extract_numbers(
    pdf_path: &Path,
    backend: &dyn PdfBackend,
) -> Result<SectionNumbers, ProcessError> {
    let outcome = process_document(
        pdf_path,
        backend,
        &SectionExtractor::new(),
        |_| {},
        &CancellationToken::new(),
    )?;
    match outcome {
        ProcessOutcome::Completed(numbers) => Ok(numbers),
        // Nothing else holds the token.
        ProcessOutcome::Cancelled => Ok(SectionNumbers::new()),
    }
}
