use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for PDF text extraction backends.
///
/// Implementors only turn a file into per-page plain text; section
/// segmentation and number matching live in `tmj_parsing`.
pub trait PdfBackend: Send + Sync {
    /// Open a PDF file for page-by-page text extraction.
    fn open(&self, path: &Path) -> Result<Box<dyn PageSource>, BackendError>;
}

/// An opened document that yields plain text one page at a time.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Plain text of page `index` (0-based), lines separated by `\n`.
    fn page_text(&mut self, index: usize) -> Result<String, BackendError>;
}
