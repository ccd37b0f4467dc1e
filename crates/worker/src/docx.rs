//! DOCX text extraction
//!
//! Walks the document body paragraph by paragraph and collects run text.
//! Tables and other non-paragraph children are skipped; a document that
//! yields no text at all is an error.

use crate::errors::ProcessError;
use std::path::Path;
use tracing::debug;

/// Extract text content from a DOCX file
pub fn extract_text_from_docx(path: &Path) -> Result<String, ProcessError> {
    let reference = path.display().to_string();

    let bytes = std::fs::read(path).map_err(|e| ProcessError::SourceUnavailable {
        reference: reference.clone(),
        detail: format!("Failed to read DOCX: {}", e),
    })?;

    let doc = docx_rs::read_docx(&bytes).map_err(|e| ProcessError::SourceUnavailable {
        reference: reference.clone(),
        detail: format!("Failed to parse DOCX: {}", e),
    })?;

    let mut text = String::new();
    let mut paragraph_count = 0usize;

    for child in doc.document.children {
        if let docx_rs::DocumentChild::Paragraph(p) = child {
            paragraph_count += 1;
            for child in p.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(t) = child {
                            text.push_str(&t.text);
                        }
                    }
                }
            }
            text.push('\n');
        }
    }

    debug!(paragraph_count, "Extracted text from DOCX");

    if text.trim().is_empty() {
        return Err(ProcessError::SourceUnavailable {
            reference,
            detail: "No text content extracted from DOCX".to_string(),
        });
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_docx(name: &str, paragraphs: &[&str]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("studymill-docx-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);

        let mut docx = docx_rs::Docx::new();
        for text in paragraphs {
            docx = docx.add_paragraph(
                docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text(*text)),
            );
        }
        let file = std::fs::File::create(&path).unwrap();
        docx.build().pack(file).unwrap();

        path
    }

    #[test]
    fn test_extracts_paragraph_text() {
        let path = write_docx(
            "notes.docx",
            &["Ownership moves values.", "Borrows do not."],
        );
        let text = extract_text_from_docx(&path).unwrap();
        assert!(text.contains("Ownership moves values."));
        assert!(text.contains("Borrows do not."));
    }

    #[test]
    fn test_empty_document_is_source_unavailable() {
        let path = write_docx("empty.docx", &[]);
        let err = extract_text_from_docx(&path).unwrap_err();
        assert!(matches!(err, ProcessError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_missing_file_is_source_unavailable() {
        let err = extract_text_from_docx(Path::new("/nonexistent/file.docx")).unwrap_err();
        assert!(matches!(err, ProcessError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_garbage_bytes_are_source_unavailable() {
        let dir = std::env::temp_dir().join(format!("studymill-docx-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.docx");
        std::fs::write(&path, b"not a zip archive").unwrap();

        let err = extract_text_from_docx(&path).unwrap_err();
        assert!(matches!(err, ProcessError::SourceUnavailable { .. }));
    }
}
