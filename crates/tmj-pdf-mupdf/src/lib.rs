use std::path::Path;

use mupdf::{Document, TextPageFlags};

use tmj_core::{BackendError, PageSource, PdfBackend};

/// MuPDF-based implementation of [`PdfBackend`].
///
/// This crate is the sole AGPL island: it isolates the mupdf dependency
/// (which is AGPL-3.0) so that the extraction core does not transitively
/// depend on it.
///
/// Page text is rebuilt from MuPDF's block/line structure, one output line
/// per text line, so that the line-oriented section markers see the same
/// line breaks as the printed journal.
#[derive(Debug, Default, Clone, Copy)]
pub struct MupdfBackend;

impl MupdfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PdfBackend for MupdfBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn PageSource>, BackendError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| BackendError::OpenError("invalid path encoding".into()))?;

        let document =
            Document::open(path_str).map_err(|e| BackendError::OpenError(e.to_string()))?;
        let page_count = document
            .page_count()
            .map_err(|e| BackendError::OpenError(e.to_string()))?;
        let page_count = usize::try_from(page_count)
            .map_err(|_| BackendError::OpenError(format!("invalid page count {page_count}")))?;

        tracing::debug!(path = %path.display(), pages = page_count, "opened PDF");
        Ok(Box::new(MupdfPages {
            document,
            page_count,
        }))
    }
}

/// An open MuPDF document.
struct MupdfPages {
    document: Document,
    page_count: usize,
}

impl PageSource for MupdfPages {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_text(&mut self, index: usize) -> Result<String, BackendError> {
        let page_no = i32::try_from(index)
            .map_err(|_| BackendError::ExtractionError(format!("page index {index} out of range")))?;
        let page = self
            .document
            .load_page(page_no)
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?;
        let text_page = page
            .to_text_page(TextPageFlags::empty())
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?;

        let mut page_text = String::new();
        for block in text_page.blocks() {
            for line in block.lines() {
                if !page_text.is_empty() {
                    page_text.push('\n');
                }
                page_text.extend(line.chars().map(|c| c.char().unwrap_or('\u{FFFD}')));
            }
        }
        Ok(page_text)
    }
}
