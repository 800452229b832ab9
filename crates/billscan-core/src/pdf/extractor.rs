//! Structured PDF text extraction using lopdf and pdf-extract.

use lopdf::Document;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, trace, warn};

use super::{Result, TextRecoveryStrategy};
use crate::error::PdfError;

/// Pages beyond this are ignored.
const MAX_PAGES: usize = 50;

/// Decodes the PDF page tree.
///
/// lopdf reads the page tree page by page; pdf-extract, which follows font
/// encodings more closely, decodes the whole document when lopdf yields no
/// text.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredExtractor;

impl StructuredExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Load a document, decrypting it with the empty password if needed.
    ///
    /// Returns the document and the bytes pdf-extract should read.
    fn load(&self, data: &[u8]) -> Result<(Document, Vec<u8>)> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        let raw = if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            let mut decrypted = Vec::new();
            doc.save_to(&mut decrypted)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            data.to_vec()
        };

        if doc.get_pages().is_empty() {
            return Err(PdfError::NoPages);
        }
        Ok((doc, raw))
    }

    /// Extract the document text, pages separated by blank lines.
    pub fn extract(&self, data: &[u8]) -> Result<String> {
        let (doc, raw) = self.load(data)?;
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().take(MAX_PAGES).collect();
        debug!("Loaded PDF with {} pages", page_numbers.len());

        let mut pages = Vec::with_capacity(page_numbers.len());
        for number in page_numbers {
            match doc.extract_text(&[number]) {
                Ok(text) => pages.push(text),
                Err(e) => trace!("lopdf could not decode page {}: {}", number, e),
            }
        }

        if pages.iter().all(|p| p.trim().is_empty()) {
            pages = vec![decode_whole(&raw)?];
        }

        let text = pages
            .iter()
            .map(|p| p.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        debug!("Structured extraction: {} chars", text.len());
        Ok(text)
    }
}

/// pdf-extract over the whole document. It panics on some malformed fonts.
fn decode_whole(raw: &[u8]) -> Result<String> {
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(raw))) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(PdfError::TextExtraction(e.to_string())),
        Err(_) => Err(PdfError::TextExtraction("pdf-extract panicked".to_string())),
    }
}

impl TextRecoveryStrategy for StructuredExtractor {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn confidence_hint(&self) -> f32 {
        1.0
    }

    fn time_bounded(&self) -> bool {
        true
    }

    fn recover(&self, bytes: &[u8]) -> Option<String> {
        match self.extract(bytes) {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                warn!("Structured PDF extraction failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_a_parse_error() {
        let extractor = StructuredExtractor::new();
        assert!(matches!(
            extractor.extract(b"definitely not a pdf"),
            Err(PdfError::Parse(_))
        ));
        assert_eq!(extractor.recover(b"definitely not a pdf"), None);
    }

    #[test]
    fn test_strategy_metadata() {
        let extractor = StructuredExtractor::new();
        assert_eq!(extractor.name(), "structured");
        assert_eq!(extractor.confidence_hint(), 1.0);
        assert!(extractor.time_bounded());
    }

    fn two_page_pdf() -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{Object, Stream, dictionary};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for line in ["Electricity statement", "Amount due: $64.20"] {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => 2,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_extract_reads_every_page() {
        let bytes = two_page_pdf();
        let text = StructuredExtractor::new().extract(&bytes).unwrap();
        assert!(text.contains("Electricity statement"));
        assert!(text.contains("64.20"));
        assert_eq!(StructuredExtractor::new().recover(&bytes), Some(text));
    }
}
