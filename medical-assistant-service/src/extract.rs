use std::path::Path;
use tracing::{debug, info};

use crate::error::AnalysisError;

/// Produces the text of each page of a document, in order.
pub trait DocumentExtractor: Send + Sync {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, AnalysisError>;
}

/// PDF text extractor using the pdf-extract crate.
/// Reads embedded text layers only; scanned image pages come back empty.
pub struct PdfTextExtractor;

impl DocumentExtractor for PdfTextExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>, AnalysisError> {
        let bytes = std::fs::read(path).map_err(|e| {
            AnalysisError::Extraction(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
            .map_err(|e| AnalysisError::Extraction(e.to_string()))?;

        info!(path = %path.display(), pages = pages.len(), "Extracted PDF pages");
        Ok(pages)
    }
}

/// Join the pages that carry text, one newline after each.
/// A document with no text at all is an error, not an empty string.
pub fn join_pages(pages: &[String]) -> Result<String, AnalysisError> {
    let mut text = String::new();
    for (i, page) in pages.iter().enumerate() {
        let page = page.trim();
        if page.is_empty() {
            debug!(page = i + 1, "Skipping page without extractable text");
            continue;
        }
        text.push_str(page);
        text.push('\n');
    }

    if text.is_empty() {
        return Err(AnalysisError::NoReadableText);
    }
    Ok(text)
}
