//! PDF text extraction
//!
//! Pulls plain text out of a PDF with lopdf, page by page. A page that
//! cannot be decoded is skipped; a document that yields no text at all is an
//! error, because there is nothing to summarize.

use crate::errors::ProcessError;
use std::path::Path;
use tracing::{debug, warn};

/// Extract text content from a PDF file
pub fn extract_text_from_pdf(path: &Path) -> Result<String, ProcessError> {
    let reference = path.display().to_string();

    let doc = lopdf::Document::load(path).map_err(|e| ProcessError::SourceUnavailable {
        reference: reference.clone(),
        detail: format!("Failed to load PDF: {}", e),
    })?;

    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut text = String::new();
    for page_num in pages {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => {
                warn!(page = page_num, error = %e, "Skipping undecodable PDF page");
            }
        }
    }

    if text.trim().is_empty() {
        return Err(ProcessError::SourceUnavailable {
            reference,
            detail: "No text content extracted from PDF".to_string(),
        });
    }

    Ok(normalize_whitespace(&text))
}

/// Collapse runs of whitespace; PDF extraction tends to scatter newlines and
/// doubled spaces through the text.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(
            normalize_whitespace("Hello   World\n\nTest\t!"),
            "Hello World Test !"
        );
    }

    #[test]
    fn test_missing_pdf_is_source_unavailable() {
        let err = extract_text_from_pdf(Path::new("/nonexistent/file.pdf")).unwrap_err();
        assert!(matches!(err, ProcessError::SourceUnavailable { .. }));
    }
}
