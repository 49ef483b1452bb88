//! Question → ranked chunks.

use std::sync::Arc;

use tracing::{Instrument, debug, info_span};

use crate::config::RagConfig;
use crate::document::RetrievalResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Embeds a question and searches one collection for its nearest chunks.
///
/// The embedding provider must be the one the collection was ingested
/// with; nothing here can detect a mismatch.
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    collection: String,
    top_k: usize,
    similarity_threshold: Option<f32>,
}

impl Retriever {
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        config: &RagConfig,
    ) -> Self {
        Self {
            embedding_provider,
            vector_store,
            collection: collection.into(),
            top_k: config.top_k,
            similarity_threshold: config.similarity_threshold,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Return the `top_k` chunks most similar to `question` in descending
    /// score order. Negative scores are kept unless a similarity threshold
    /// is configured.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmbeddingError`] if the question cannot be embedded
    /// - [`RagError::VectorStoreError`] if the search fails, including when
    ///   the collection has not been ingested yet
    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResult> {
        let span = info_span!("docchat.retrieve", collection = %self.collection, top_k = self.top_k);
        async {
            let embedding = self.embedding_provider.embed(question).await?;
            let expected = self.embedding_provider.dimensions();
            if embedding.len() != expected {
                return Err(RagError::EmbeddingError {
                    provider: self.embedding_provider.name().to_string(),
                    message: format!("expected {expected} dimensions, got {}", embedding.len()),
                });
            }

            let results = self.vector_store.search(&self.collection, &embedding, self.top_k).await?;
            let ranked = match self.similarity_threshold {
                Some(threshold) => results.into_iter().filter(|r| r.score >= threshold).collect(),
                None => results,
            };
            let retrieval = RetrievalResult::from_ranked(ranked);

            debug!(
                chunk_count = retrieval.chunks.len(),
                source_count = retrieval.sources.len(),
                "retrieval complete"
            );
            Ok(retrieval)
        }
        .instrument(span)
        .await
    }
}
