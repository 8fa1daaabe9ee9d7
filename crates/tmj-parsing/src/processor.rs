use std::path::Path;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use tmj_core::{BackendError, PageSource, PdfBackend, ProgressEvent, Section, SectionNumbers};

use crate::extractor::SectionExtractor;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("{0}")]
    Open(#[from] BackendError),
}

/// How a processing run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Completed(SectionNumbers),
    /// The cancellation token was tripped; no numbers are reported.
    Cancelled,
}

impl ProcessOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProcessOutcome::Cancelled)
    }
}

/// Open a PDF through `backend` and extract every section's numbers.
///
/// Work is `pages × sections` units, done section by section in
/// [`Section::ALL`] order and page by page within a section. A
/// [`ProgressEvent::PageProcessed`] follows every finished unit. Cancellation
/// is polled at every section start, before and after every page (and by the
/// extractor before every line). Failure to open the document is the only error; a page whose
/// text cannot be extracted is logged and skipped.
pub fn process_document<F>(
    pdf_path: &Path,
    backend: &dyn PdfBackend,
    extractor: &SectionExtractor,
    progress: F,
    cancel: &CancellationToken,
) -> Result<ProcessOutcome, ProcessError>
where
    F: Fn(ProgressEvent),
{
    let mut pages = backend.open(pdf_path).map_err(|e| {
        tracing::error!(path = %pdf_path.display(), error = %e, "failed to open document");
        ProcessError::Open(e)
    })?;
    Ok(process_pages(pages.as_mut(), extractor, progress, cancel))
}

/// [`process_document`] over an already opened page source.
pub fn process_pages<F>(
    pages: &mut dyn PageSource,
    extractor: &SectionExtractor,
    progress: F,
    cancel: &CancellationToken,
) -> ProcessOutcome
where
    F: Fn(ProgressEvent),
{
    let page_count = pages.page_count();
    let total = page_count * Section::ALL.len();
    let mut texts = PageTexts::new(page_count);
    let mut results = SectionNumbers::new();
    let mut completed = 0;

    tracing::info!(pages = page_count, units = total, "processing document");

    for section in Section::ALL {
        if cancel.is_cancelled() {
            return cancelled(completed, total);
        }
        progress(ProgressEvent::SectionStarted { section });

        for page_index in 0..page_count {
            if cancel.is_cancelled() {
                return cancelled(completed, total);
            }

            if let Some(text) = texts.get(pages, page_index) {
                results.extend(section, extractor.extract(text, section, cancel));
            }
            // An interrupted unit is not counted as done.
            if cancel.is_cancelled() {
                return cancelled(completed, total);
            }

            completed += 1;
            progress(ProgressEvent::PageProcessed {
                section,
                page_index,
                completed,
                total,
            });
        }

        tracing::debug!(section = %section, found = results.get(section).len(), "section scanned");
    }

    // A cancel landing after the last unit still wins over the collected data.
    if cancel.is_cancelled() {
        return cancelled(completed, total);
    }

    results.dedup();
    tracing::info!(
        pages = page_count,
        numbers = results.total(),
        skipped_pages = texts.failed(),
        "document processed"
    );
    ProcessOutcome::Completed(results)
}

fn cancelled(completed: usize, total: usize) -> ProcessOutcome {
    tracing::info!(completed, total, "processing cancelled");
    ProcessOutcome::Cancelled
}

enum PageText {
    Pending,
    Ready(String),
    Failed,
}

/// Per-page text, pulled from the source at most once.
struct PageTexts {
    slots: Vec<PageText>,
}

impl PageTexts {
    fn new(page_count: usize) -> Self {
        Self {
            slots: (0..page_count).map(|_| PageText::Pending).collect(),
        }
    }

    fn get(&mut self, source: &mut dyn PageSource, index: usize) -> Option<&str> {
        if matches!(self.slots[index], PageText::Pending) {
            self.slots[index] = match source.page_text(index) {
                Ok(text) => PageText::Ready(text),
                Err(e) => {
                    tracing::warn!(page = index + 1, error = %e, "page text extraction failed, skipping page");
                    PageText::Failed
                }
            };
        }
        match &self.slots[index] {
            PageText::Ready(text) => Some(text),
            PageText::Pending | PageText::Failed => None,
        }
    }

    fn failed(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, PageText::Failed))
            .count()
    }
}
