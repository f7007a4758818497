//! PDF text pipeline: paged extraction up to a cap, then whitespace cleanup.

use std::panic::{self, AssertUnwindSafe};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{AppError, Result};

/// Extracts plain text per page, in page order, reading at most `max_pages` pages.
pub trait PdfTextExtractor: Send + Sync {
    fn extract_pages(&self, bytes: &[u8], max_pages: usize) -> Result<Vec<String>>;
}

/// Backend built on the `pdf-extract` crate.
///
/// Pages past `max_pages` are never parsed. A page that errors or panics is
/// skipped and the pages read so far are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractBackend;

impl PdfTextExtractor for PdfExtractBackend {
    fn extract_pages(&self, bytes: &[u8], max_pages: usize) -> Result<Vec<String>> {
        let mut doc = pdf_extract::Document::load_mem(bytes)
            .map_err(|e| AppError::ParseError(format!("Failed to read PDF: {}", e)))?;
        if doc.is_encrypted() {
            if let Err(e) = doc.decrypt("") {
                warn!(error = %e, "Failed to decrypt PDF");
            }
        }

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().take(max_pages).collect();
        let mut pages = Vec::with_capacity(page_numbers.len());
        for page_num in page_numbers {
            let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut text = String::new();
                {
                    let mut output = pdf_extract::PlainTextOutput::new(&mut text);
                    pdf_extract::output_doc_page(&doc, &mut output, page_num)?;
                }
                Ok::<_, pdf_extract::OutputError>(text)
            }));
            match attempt {
                Ok(Ok(text)) => pages.push(text),
                Ok(Err(e)) => warn!(page = page_num, error = %e, "Skipping unreadable PDF page"),
                Err(_) => warn!(page = page_num, "PDF page parser panicked, skipping page"),
            }
        }
        Ok(pages)
    }
}

static WHITESPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").expect("Failed to compile whitespace pattern")
});

static PAGE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bPage\s+\d+(?:\s+of\s+\d+)?\b").expect("Failed to compile page marker pattern")
});

/// Collapse whitespace runs, drop "Page N" artifacts and trim.
///
/// Runs to a fixed point so cleaning already-clean text is a no-op.
pub fn clean_text(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let stripped = PAGE_MARKER.replace_all(&current, " ");
        let next = WHITESPACE.replace_all(&stripped, " ").trim().to_string();
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Join non-empty pages with a paragraph break, stopping at `max_pages`.
pub fn join_pages(pages: &[String], max_pages: usize) -> String {
    pages
        .iter()
        .take(max_pages)
        .map(|page| page.trim())
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Extract and clean text from a PDF payload. Never fails: problems yield empty text.
pub fn extract_text(extractor: &dyn PdfTextExtractor, bytes: &[u8], max_pages: usize) -> String {
    let pages = match extractor.extract_pages(bytes, max_pages) {
        Ok(pages) => pages,
        Err(e) => {
            warn!(error = %e, "PDF text extraction failed");
            return String::new();
        }
    };

    let text = clean_text(&join_pages(&pages, max_pages));
    debug!(pages = pages.len().min(max_pages), chars = text.len(), "Extracted PDF text");
    text
}
