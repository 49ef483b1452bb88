//! Data types for documents, chunks, and search results.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Metadata key holding the source identifier (document path) of a chunk.
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding the 1-based page number of a chunk.
pub const PAGE_KEY: &str = "page";
/// Metadata key holding the chunk's position within its document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
/// Metadata key holding the character offset of a chunk within its page.
pub const START_INDEX_KEY: &str = "start_index";

/// One page of extracted text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    pub text: String,
}

/// A source document with its extracted text, page by page.
///
/// Only lives for the duration of an ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// Source identifier, usually the path the document was loaded from.
    pub source: String,
    pub pages: Vec<Page>,
    /// Key-value metadata copied onto every chunk.
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// A document whose id and source are both `source`.
    pub fn new(source: impl Into<String>, pages: Vec<Page>) -> Self {
        let source = source.into();
        Self { id: source.clone(), source, pages, metadata: HashMap::new() }
    }

    /// A single-page document.
    pub fn from_text(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(source, vec![Page { number: 1, text: text.into() }])
    }

    /// Total number of characters across all pages.
    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.text.chars().count()).sum()
    }
}

/// A segment of a [`Document`] page with its vector embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The vector embedding for this chunk's text.
    pub embedding: Vec<f32>,
    /// Key-value metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: HashMap<String, String>,
    /// The ID of the parent [`Document`].
    pub document_id: String,
}

impl Chunk {
    /// The chunk's source identifier, if it has one.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).map(String::as_str)
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// Ranked chunks for one question plus the sources they came from.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalResult {
    /// Descending similarity order.
    pub chunks: Vec<SearchResult>,
    pub sources: BTreeSet<String>,
}

impl RetrievalResult {
    /// Build a result from ranked chunks, collecting their distinct sources.
    pub fn from_ranked(chunks: Vec<SearchResult>) -> Self {
        let sources =
            chunks.iter().filter_map(|r| r.chunk.source()).map(str::to_string).collect();
        Self { chunks, sources }
    }

    /// Chunk texts in rank order.
    pub fn contexts(&self) -> Vec<String> {
        self.chunks.iter().map(|r| r.chunk.text.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, source: Option<&str>, score: f32) -> SearchResult {
        let mut metadata = HashMap::new();
        if let Some(source) = source {
            metadata.insert(SOURCE_KEY.to_string(), source.to_string());
        }
        SearchResult {
            chunk: Chunk {
                id: id.to_string(),
                text: format!("text of {id}"),
                embedding: Vec::new(),
                metadata,
                document_id: "doc".to_string(),
            },
            score,
        }
    }

    #[test]
    fn sources_are_deduplicated_and_missing_sources_skipped() {
        let result = RetrievalResult::from_ranked(vec![
            hit("a", Some("paper.pdf"), 0.9),
            hit("b", None, 0.8),
            hit("c", Some("paper.pdf"), 0.7),
            hit("d", Some("notes.pdf"), 0.6),
        ]);
        assert_eq!(result.sources.len(), 2);
        assert!(result.sources.contains("notes.pdf"));
        assert_eq!(result.contexts()[1], "text of b");
    }
}
