//! Document loader
//!
//! Converts a file on disk into plain text suitable for chunking. The
//! extension allow-list is fixed: plain text and Markdown are read directly,
//! PDFs and DOCX files go through their extraction modules. Everything else
//! is rejected before any bytes are read.

use crate::docx::extract_text_from_docx;
use crate::errors::ProcessError;
use crate::pdf::extract_text_from_pdf;
use std::path::Path;

/// Load the content of a document and return it as plain text.
pub fn load_document(path: &Path) -> Result<String, ProcessError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let text = match extension.as_str() {
        "txt" | "md" => {
            std::fs::read_to_string(path).map_err(|e| ProcessError::SourceUnavailable {
                reference: path.display().to_string(),
                detail: e.to_string(),
            })?
        }
        "pdf" => extract_text_from_pdf(path)?,
        "docx" => extract_text_from_docx(path)?,
        _ => {
            return Err(ProcessError::UnsupportedFormat {
                extension: if extension.is_empty() {
                    "(none)".to_string()
                } else {
                    format!(".{}", extension)
                },
            })
        }
    };

    if text.trim().is_empty() {
        return Err(ProcessError::SourceUnavailable {
            reference: path.display().to_string(),
            detail: "Document contains no text".to_string(),
        });
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_file(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("studymill-loader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_txt_loads() {
        let path = scratch_file("doc.txt", "plain text body");
        assert_eq!(load_document(&path).unwrap(), "plain text body");
    }

    #[test]
    fn test_docx_loads() {
        let dir = std::env::temp_dir().join(format!("studymill-loader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("notes.docx");

        let docx = docx_rs::Docx::new().add_paragraph(
            docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text("Lifetimes bound borrows.")),
        );
        let file = std::fs::File::create(&path).unwrap();
        docx.build().pack(file).unwrap();

        let text = load_document(&path).unwrap();
        assert!(text.contains("Lifetimes bound borrows."));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let err = load_document(Path::new("archive.docx.zip")).unwrap_err();
        assert!(matches!(err, ProcessError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_no_extension_rejected() {
        let err = load_document(Path::new("README")).unwrap_err();
        assert!(matches!(err, ProcessError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_missing_file_is_source_unavailable() {
        let err = load_document(Path::new("/nonexistent/doc.txt")).unwrap_err();
        assert!(matches!(err, ProcessError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_empty_file_is_source_unavailable() {
        let path = scratch_file("empty.txt", "   \n");
        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, ProcessError::SourceUnavailable { .. }));
    }
}
