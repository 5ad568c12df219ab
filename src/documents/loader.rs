//! Document Loading
//!
//! Reads a policy document from disk into ordered page segments. PDFs yield
//! one segment per page; plain-text and markdown files yield one segment.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Maximum file size (50 MB) accepted for loading.
const MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("Invalid PDF: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("No extractable text in {0}")]
    NoText(String),
    #[error("File too large: {0} bytes (max {1} bytes)")]
    FileTooLarge(u64, u64),
}

/// Supported document kinds, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    PlainText,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "txt" | "md" | "markdown" => Ok(DocumentKind::PlainText),
            other => Err(LoadError::UnsupportedType(if other.is_empty() {
                path.display().to_string()
            } else {
                other.to_string()
            })),
        }
    }
}

/// Text of one page (or of a whole non-paginated file)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSegment {
    pub text: String,
    /// Path the document was loaded from
    pub source: String,
    /// 1-based page number
    pub page: u32,
}

/// Load a document into page segments, in page order.
pub fn load_document(path: &Path) -> Result<Vec<PageSegment>, LoadError> {
    let file_size = fs::metadata(path)?.len();
    if file_size > MAX_FILE_SIZE {
        return Err(LoadError::FileTooLarge(file_size, MAX_FILE_SIZE));
    }

    let kind = DocumentKind::from_path(path)?;
    let source = path.to_string_lossy().to_string();

    let segments = match kind {
        DocumentKind::Pdf => load_pdf(path, &source)?,
        DocumentKind::PlainText => vec![PageSegment {
            text: fs::read_to_string(path)?,
            source: source.clone(),
            page: 1,
        }],
    };

    if segments.iter().all(|s| s.text.trim().is_empty()) {
        return Err(LoadError::NoText(source));
    }

    info!(source = %source, pages = segments.len(), "Loaded document");
    Ok(segments)
}

fn load_pdf(path: &Path, source: &str) -> Result<Vec<PageSegment>, LoadError> {
    let document = lopdf::Document::load(path)?;
    let mut segments = Vec::new();

    for page in document.get_pages().keys().copied() {
        match document.extract_text(&[page]) {
            Ok(text) => {
                debug!(source = %source, page = page, chars = text.len(), "Extracted page");
                segments.push(PageSegment {
                    text,
                    source: source.to_string(),
                    page,
                });
            }
            Err(e) => warn!(source = %source, page = page, error = %e, "Skipping unreadable page"),
        }
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_document_kind_from_extension() {
        assert_eq!(DocumentKind::from_path(Path::new("a/b.PDF")).unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_path(Path::new("notes.md")).unwrap(), DocumentKind::PlainText);
        assert!(matches!(
            DocumentKind::from_path(Path::new("sheet.xlsx")),
            Err(LoadError::UnsupportedType(ext)) if ext == "xlsx"
        ));
        assert!(DocumentKind::from_path(Path::new("README")).is_err());
    }

    #[test]
    fn test_load_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handbook.txt");
        fs::write(&path, "Annual leave is 25 days.").unwrap();

        let segments = load_document(&path).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].page, 1);
        assert_eq!(segments[0].text, "Annual leave is 25 days.");
        assert_eq!(segments[0].source, path.to_string_lossy());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_document(Path::new("/definitely/not/here.pdf"));
        assert!(matches!(result, Err(LoadError::Io(_))));
    }

    #[test]
    fn test_blank_file_has_no_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.txt");
        fs::write(&path, "  \n\n ").unwrap();
        assert!(matches!(load_document(&path), Err(LoadError::NoText(_))));
    }

    /// Write a PDF with one page per entry; `None` pages carry no text.
    fn write_pdf(path: &Path, pages: &[Option<&str>]) {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for text in pages {
            let operations = match text {
                Some(text) => vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
                None => Vec::new(),
            };
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(pages_id, Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn test_load_pdf_one_segment_per_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handbook.pdf");
        write_pdf(&path, &[Some("Annual leave is 25 days."), Some("Fire drills occur monthly.")]);

        let segments = load_document(&path).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].page, 1);
        assert_eq!(segments[1].page, 2);
        assert!(segments[0].text.contains("Annual leave is 25 days."));
        assert!(segments[1].text.contains("Fire drills occur monthly."));
        assert!(segments.iter().all(|s| s.source == path.to_string_lossy()));
    }

    #[test]
    fn test_pdf_without_text_has_no_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scanned.pdf");
        write_pdf(&path, &[None, None]);
        assert!(matches!(load_document(&path), Err(LoadError::NoText(_))));
    }

    #[test]
    fn test_corrupt_pdf_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"this is not a pdf").unwrap();
        assert!(matches!(load_document(&path), Err(LoadError::Pdf(_))));
    }
}
