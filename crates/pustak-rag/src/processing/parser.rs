//! Document text extraction. PDFs are read page by page with lopdf; plain
//! text and markdown files are treated as a single unpaginated page.

use std::path::Path;

use crate::error::{RagError, Result};

/// Extracted text for one page of a document.
#[derive(Debug, Clone)]
pub struct PageText {
    /// 1-based page number; 0 for documents without pagination.
    pub page: usize,
    pub text: String,
}

pub struct DocumentParser;

impl DocumentParser {
    pub fn new() -> Self {
        Self
    }

    pub fn supported(path: &Path) -> bool {
        matches!(
            extension(path).as_deref(),
            Some("pdf") | Some("txt") | Some("md") | Some("markdown")
        )
    }

    pub fn parse_file(&self, path: &Path) -> Result<Vec<PageText>> {
        match extension(path).as_deref() {
            Some("pdf") => self.parse_pdf(path),
            Some("txt") | Some("md") | Some("markdown") => {
                let text = std::fs::read_to_string(path).map_err(|e| RagError::Document {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
                Ok(vec![PageText { page: 0, text }])
            }
            other => Err(RagError::Document {
                path: path.to_path_buf(),
                reason: format!("unsupported extension: {:?}", other),
            }),
        }
    }

    fn parse_pdf(&self, path: &Path) -> Result<Vec<PageText>> {
        let doc = lopdf::Document::load(path).map_err(|e| RagError::Document {
            path: path.to_path_buf(),
            reason: format!("lopdf: {}", e),
        })?;

        let mut pages = Vec::new();
        for (&page_no, _) in doc.get_pages().iter() {
            // A page that fails extraction contributes empty text rather than
            // aborting the whole document; scanned pages are common.
            let text = doc.extract_text(&[page_no]).unwrap_or_default();
            pages.push(PageText {
                page: page_no as usize,
                text,
            });
        }
        Ok(pages)
    }
}

impl Default for DocumentParser {
    fn default() -> Self {
        Self::new()
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
