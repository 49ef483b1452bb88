//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`FixedSizeChunker`], which
//! splits each page by character count with a fixed overlap.

use crate::document::{CHUNK_INDEX_KEY, Chunk, Document, PAGE_KEY, SOURCE_KEY, START_INDEX_KEY};

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later by the ingestion pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no text.
    /// Each returned chunk has an empty embedding vector.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits every page into fixed-size chunks by character count with
/// configurable overlap.
///
/// Chunks never span pages. For a page of `L` characters the chunker emits
/// one chunk if `L <= chunk_size`, otherwise `ceil((L - overlap) / (chunk_size - overlap))`
/// chunks; each chunk after the first repeats the last `overlap` characters
/// of its predecessor. Boundaries ignore sentence and word structure.
///
/// Chunk IDs are generated as `{document_id}_{chunk_index}` where the index
/// counts across the whole document. Each chunk inherits the document's
/// metadata plus `source`, `page`, `chunk_index` and `start_index`.
///
/// # Example
///
/// ```rust
/// use docchat_rag::{Chunker, Document, FixedSizeChunker};
///
/// let chunker = FixedSizeChunker::new(1000, 200);
/// let document = Document::from_text("notes.txt", "a".repeat(1400));
/// assert_eq!(chunker.chunk(&document).len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk
    /// * `chunk_overlap` - number of overlapping characters between consecutive chunks
    ///
    /// An overlap not smaller than the size is treated as no overlap;
    /// [`RagConfig`](crate::RagConfig) rejects such values up front.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let chunk_overlap = if chunk_overlap >= chunk_size { 0 } else { chunk_overlap };
        Self { chunk_size, chunk_overlap }
    }

    /// Character spans `(start, end)` for a text of `len` characters.
    fn spans(&self, len: usize) -> Vec<(usize, usize)> {
        let step = self.chunk_size - self.chunk_overlap;
        let mut spans = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(len);
            spans.push((start, end));
            if end == len {
                break;
            }
            start += step;
        }
        spans
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut chunk_index = 0;

        for page in &document.pages {
            if page.text.trim().is_empty() {
                continue;
            }
            let chars: Vec<char> = page.text.chars().collect();

            for (start, end) in self.spans(chars.len()) {
                let mut metadata = document.metadata.clone();
                metadata.insert(SOURCE_KEY.to_string(), document.source.clone());
                metadata.insert(PAGE_KEY.to_string(), page.number.to_string());
                metadata.insert(CHUNK_INDEX_KEY.to_string(), chunk_index.to_string());
                metadata.insert(START_INDEX_KEY.to_string(), start.to_string());

                chunks.push(Chunk {
                    id: format!("{}_{chunk_index}", document.id),
                    text: chars[start..end].iter().collect(),
                    embedding: Vec::new(),
                    metadata,
                    document_id: document.id.clone(),
                });
                chunk_index += 1;
            }
        }

        chunks
    }
}
