//! Extraction results and errors.

use thiserror::Error;

/// Errors produced while turning an uploaded document into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Input is not a PDF or its container structure could not be parsed.
    #[error("document is not a readable PDF: {0}")]
    Malformed(String),
    /// Document is encrypted and the empty user password does not open it.
    #[error("document is encrypted and cannot be opened without a password")]
    Encrypted,
    /// Document parsed but has no text layer on any page.
    #[error("document has no extractable text ({pages} pages scanned)")]
    NoText {
        /// Number of pages inspected.
        pages: usize,
    },
    /// Extraction worker stopped before producing a result.
    #[error("extraction worker failed: {0}")]
    Worker(String),
}

/// Normalized text of a document, page by page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pages: Vec<String>,
    text: String,
    failed_pages: usize,
}

impl ExtractedText {
    /// Assemble the result from normalized page strings in source order.
    ///
    /// Fails with [`ExtractionError::NoText`] when every page is empty, so callers never see an
    /// empty success.
    pub fn from_pages(pages: Vec<String>, failed_pages: usize) -> Result<Self, ExtractionError> {
        let text = pages
            .iter()
            .map(String::as_str)
            .filter(|page| !page.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            return Err(ExtractionError::NoText { pages: pages.len() });
        }
        Ok(Self {
            pages,
            text,
            failed_pages,
        })
    }

    /// Per-page text; empty pages are empty strings.
    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    /// Number of pages in the source document.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Non-empty pages joined by a single space.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Pages whose content could not be decoded and were recorded as empty.
    pub fn failed_pages(&self) -> usize {
        self.failed_pages
    }

    /// Consume the result, keeping only the flattened text.
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Synchronous text extraction over an in-memory document.
pub trait TextExtractor: Send + Sync {
    /// Extract normalized text from the raw document bytes.
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractionError>;
}
