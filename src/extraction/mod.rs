//! Text-layer extraction: PDF bytes in, normalized page text out.

mod normalize;
mod pdf;
mod types;

pub use normalize::normalize_page_text;
pub use pdf::PdfExtractor;
pub use types::{ExtractedText, ExtractionError, TextExtractor};

#[cfg(test)]
pub(crate) use pdf::fixtures as pdf_fixtures;
