//! PDF text-layer extraction backed by `lopdf`.

use lopdf::Document;

use super::normalize::normalize_page_text;
use super::types::{ExtractedText, ExtractionError, TextExtractor};

const PDF_MAGIC: &[u8] = b"%PDF-";
/// Readers accept leading garbage before the header within the first KiB.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Extracts the text layer of PDF documents page by page.
///
/// A page whose content stream cannot be decoded is recorded as an empty string and counted
/// in [`ExtractedText::failed_pages`]; the remaining pages are still extracted.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl PdfExtractor {
    /// Construct a new extractor.
    pub const fn new() -> Self {
        Self
    }
}

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        ensure_pdf_header(bytes)?;

        let mut document = Document::load_mem(bytes).map_err(classify_load_error)?;

        if document.is_encrypted() {
            document.decrypt("").map_err(|error| {
                tracing::debug!(error = %error, "Empty-password decryption failed");
                match error {
                    lopdf::Error::Decryption(_) => ExtractionError::Encrypted,
                    other => ExtractionError::Malformed(other.to_string()),
                }
            })?;
        }

        let page_numbers: Vec<u32> = document.get_pages().into_keys().collect();
        let mut pages = Vec::with_capacity(page_numbers.len());
        let mut failed_pages = 0;

        for page_number in page_numbers {
            match document.extract_text(&[page_number]) {
                Ok(raw) => pages.push(normalize_page_text(&raw)),
                Err(error) => {
                    tracing::warn!(
                        page = page_number,
                        error = %error,
                        "Failed to decode page text; recording it as empty"
                    );
                    failed_pages += 1;
                    pages.push(String::new());
                }
            }
        }

        let extracted = ExtractedText::from_pages(pages, failed_pages)?;
        tracing::debug!(
            pages = extracted.page_count(),
            failed_pages,
            chars = extracted.text().chars().count(),
            "Extracted PDF text"
        );
        Ok(extracted)
    }
}

fn ensure_pdf_header(bytes: &[u8]) -> Result<(), ExtractionError> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    if window
        .windows(PDF_MAGIC.len())
        .any(|candidate| candidate == PDF_MAGIC)
    {
        Ok(())
    } else {
        Err(ExtractionError::Malformed("missing %PDF- header".into()))
    }
}

fn classify_load_error(error: lopdf::Error) -> ExtractionError {
    match error {
        lopdf::Error::Decryption(_) => ExtractionError::Encrypted,
        other => ExtractionError::Malformed(other.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, StringFormat, dictionary};

    /// Build an in-memory PDF with one text-bearing page per entry.
    pub(crate) fn text_pdf(pages: &[&str]) -> Vec<u8> {
        save(build_document(pages.iter().map(|text| text_stream(text)).collect()))
    }

    /// Build an in-memory PDF whose pages only paint graphics.
    pub(crate) fn image_only_pdf(page_count: usize) -> Vec<u8> {
        save(build_document(
            (0..page_count).map(|_| graphics_stream()).collect(),
        ))
    }

    /// Build an in-memory PDF from raw, possibly invalid, page content streams.
    pub(crate) fn raw_content_pdf(contents: Vec<Vec<u8>>) -> Vec<u8> {
        save(build_document(contents))
    }

    /// Build a PDF carrying a standard security handler that the empty password cannot open.
    pub(crate) fn encrypted_pdf() -> Vec<u8> {
        let mut document = build_document(vec![text_stream("Secret")]);
        let encrypt_id = document.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
            "Length" => 40,
            "O" => Object::String(vec![0x11; 32], StringFormat::Hexadecimal),
            "U" => Object::String(vec![0x22; 32], StringFormat::Hexadecimal),
            "P" => -4,
        });
        document.trailer.set("Encrypt", encrypt_id);
        document.trailer.set(
            "ID",
            vec![
                Object::String(vec![0x33; 16], StringFormat::Hexadecimal),
                Object::String(vec![0x33; 16], StringFormat::Hexadecimal),
            ],
        );
        save(document)
    }

    fn text_stream(text: &str) -> Vec<u8> {
        encode(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ])
    }

    fn graphics_stream() -> Vec<u8> {
        encode(vec![
            Operation::new("q", vec![]),
            Operation::new(
                "re",
                vec![72.into(), 72.into(), 200.into(), 200.into()],
            ),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ])
    }

    fn encode(operations: Vec<Operation>) -> Vec<u8> {
        Content { operations }.encode().expect("encode content")
    }

    fn build_document(contents: Vec<Vec<u8>>) -> Document {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let font_id = document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = document.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for content in contents {
            let content_id = document.add_object(Stream::new(dictionary! {}, content));
            let page_id = document.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        document.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);
        document
    }

    fn save(mut document: Document) -> Vec<u8> {
        let mut buffer = Vec::new();
        document.save_to(&mut buffer).expect("save pdf");
        buffer
    }
}
