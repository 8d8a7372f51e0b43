use std::fs;
use std::panic;
use std::path::Path;

use crate::document::TextExtractor;
use crate::{Error, Result};

/// Extracts text from PDFs page by page using `pdf-extract`.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        // pdf-extract can panic on malformed font or xref tables
        let outcome = panic::catch_unwind(|| pdf_extract::extract_text_by_pages(path));

        match outcome {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => Err(Error::Document(format!(
                "failed to extract text from {}: {e}",
                path.display()
            ))),
            Err(_) => Err(Error::Document(format!(
                "pdf parser panicked on {}",
                path.display()
            ))),
        }
    }
}

/// Reads plain-text and markdown files as a single page.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extensions(&self) -> &[&str] {
        &["txt", "md"]
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        let bytes = fs::read(path)?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        Ok(vec![text])
    }
}
