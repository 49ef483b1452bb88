//! Document loading: PDF page extraction and plain-text files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::document::{Document, Page};
use crate::error::{RagError, Result};

/// Turns a file on disk into a [`Document`].
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load and extract `path`. The caller has already checked it exists.
    async fn load(&self, path: &Path) -> Result<Document>;
}

/// Loads `.pdf` files page by page with `lopdf`, and `.txt` / `.md` files
/// as a single page. Other extensions are rejected.
///
/// Extraction runs on the blocking thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        Self
    }
}

fn load_error(path: &Path, message: impl Into<String>) -> RagError {
    RagError::Load { path: path.display().to_string(), message: message.into() }
}

fn load_pdf(path: &Path) -> Result<Vec<Page>> {
    let pdf = lopdf::Document::load(path).map_err(|e| load_error(path, e.to_string()))?;
    Ok(pdf
        .get_pages()
        .keys()
        .map(|&number| page_or_empty(path, number, pdf.extract_text(&[number])))
        .collect())
}

/// A page whose text cannot be extracted is kept as an empty page so the
/// rest of the document still loads; the chunker skips it.
fn page_or_empty<E: std::fmt::Display>(
    path: &Path,
    number: u32,
    extracted: std::result::Result<String, E>,
) -> Page {
    match extracted {
        Ok(text) => Page { number, text },
        Err(e) => {
            warn!(
                path = %path.display(),
                page = number,
                error = %e,
                "page text extraction failed, treating page as empty"
            );
            Page { number, text: String::new() }
        }
    }
}

fn load_text(path: &Path) -> Result<Vec<Page>> {
    let text = std::fs::read_to_string(path).map_err(|e| load_error(path, e.to_string()))?;
    Ok(vec![Page { number: 1, text }])
}

fn load_blocking(path: &Path) -> Result<Document> {
    let extension =
        path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).unwrap_or_default();
    let pages = match extension.as_str() {
        "pdf" => load_pdf(path)?,
        "txt" | "md" => load_text(path)?,
        other => {
            return Err(load_error(path, format!("unsupported file type '{other}'")));
        }
    };
    debug!(path = %path.display(), page_count = pages.len(), "document loaded");
    Ok(Document::new(path.display().to_string(), pages))
}

#[async_trait]
impl DocumentLoader for FileLoader {
    async fn load(&self, path: &Path) -> Result<Document> {
        let owned: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || load_blocking(&owned))
            .await
            .map_err(|e| load_error(path, format!("loader task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn text_files_load_as_one_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# PrimMod\nPrimitives everywhere.").unwrap();

        let document = FileLoader::new().load(&path).await.unwrap();
        assert_eq!(document.pages.len(), 1);
        assert_eq!(document.pages[0].number, 1);
        assert!(document.pages[0].text.contains("Primitives"));
        assert_eq!(document.source, path.display().to_string());
    }

    #[tokio::test]
    async fn unsupported_extension_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slides.pptx");
        std::fs::write(&path, b"binary").unwrap();

        let err = FileLoader::new().load(&path).await.unwrap_err();
        assert!(matches!(err, RagError::Load { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn corrupt_pdf_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = FileLoader::new().load(&path).await.unwrap_err();
        assert!(matches!(err, RagError::Load { .. }), "got {err:?}");
    }

    #[test]
    fn unreadable_page_becomes_empty() {
        let path = Path::new("paper.pdf");

        let page = page_or_empty(path, 3, Err::<String, _>("unsupported font encoding"));
        assert_eq!(page, Page { number: 3, text: String::new() });

        let page = page_or_empty(path, 4, Ok::<_, String>("Primitives".to_string()));
        assert_eq!(page.text, "Primitives");
    }
}
