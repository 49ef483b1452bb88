//! Ingestion pipeline: load → chunk → embed → replace collection.
//!
//! # Example
//!
//! ```rust,ignore
//! use docchat_rag::{HashEmbeddingProvider, InMemoryVectorStore, IngestionPipeline, RagConfig};
//!
//! let pipeline = IngestionPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::new()))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! let outcome = pipeline.ingest("data/primmod.pdf", "primmod_paper").await;
//! println!("{}", serde_json::to_string(&outcome)?);
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, Document};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::loader::{DocumentLoader, FileLoader};
use crate::vectorstore::VectorStore;

/// Marker serialised as `"success"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Success,
}

/// Result of [`IngestionPipeline::ingest`], serialised as
/// `{"status":"success","chunks":N}` or `{"error":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum IngestOutcome {
    Success { status: IngestStatus, chunks: usize },
    Failed { error: String },
}

impl IngestOutcome {
    pub fn success(chunks: usize) -> Self {
        Self::Success { status: IngestStatus::Success, chunks }
    }

    /// Chunks written, if the ingestion succeeded.
    pub fn chunks(&self) -> Option<usize> {
        match self {
            Self::Success { chunks, .. } => Some(*chunks),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failed { error } => Some(error),
        }
    }
}

impl From<Result<usize>> for IngestOutcome {
    fn from(result: Result<usize>) -> Self {
        match result {
            Ok(chunks) => Self::success(chunks),
            Err(e) => Self::Failed { error: e.to_string() },
        }
    }
}

/// Builds a searchable collection from documents.
///
/// The previous collection of the same name is only deleted once every
/// chunk has been embedded, so loading, chunking and embedding failures
/// leave it untouched. A failure while recreating or writing the
/// collection leaves it empty or missing; the error says so and nothing is
/// rolled back.
pub struct IngestionPipeline {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    loader: Arc<dyn DocumentLoader>,
}

impl IngestionPipeline {
    /// Create a new [`IngestionPipelineBuilder`].
    pub fn builder() -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::default()
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Ingest the file at `path` into `collection`, replacing it.
    ///
    /// Never fails: errors come back as [`IngestOutcome::Failed`].
    pub async fn ingest(&self, path: impl AsRef<Path>, collection: &str) -> IngestOutcome {
        let path = path.as_ref();
        let span = info_span!(
            "docchat.ingest",
            trace_id = %Uuid::new_v4(),
            collection,
            path = %path.display()
        );
        self.try_ingest(path, collection).instrument(span).await.into()
    }

    /// Like [`ingest`](Self::ingest), returning the typed error.
    ///
    /// # Errors
    ///
    /// - [`RagError::NotFound`] if `path` does not exist
    /// - [`RagError::Load`] if its text cannot be extracted
    /// - any error of [`ingest_documents`](Self::ingest_documents)
    pub async fn try_ingest(&self, path: &Path, collection: &str) -> Result<usize> {
        if !path.exists() {
            error!(path = %path.display(), "document not found");
            return Err(RagError::NotFound { path: path.display().to_string() });
        }
        let document = self.loader.load(path).await.inspect_err(|e| {
            error!(error = %e, "document loading failed");
        })?;
        self.ingest_documents(std::slice::from_ref(&document), collection).await
    }

    /// Chunk, embed and write already extracted documents into
    /// `collection`, replacing it. Returns the number of chunks written.
    ///
    /// # Errors
    ///
    /// - [`RagError::PipelineError`] if the documents contain no text
    /// - [`RagError::EmbeddingError`] if any chunk fails to embed
    /// - [`RagError::VectorStoreError`] if the collection cannot be replaced
    pub async fn ingest_documents(&self, documents: &[Document], collection: &str) -> Result<usize> {
        let mut chunks: Vec<Chunk> = documents.iter().flat_map(|d| self.chunker.chunk(d)).collect();
        if chunks.is_empty() {
            let sources: Vec<&str> = documents.iter().map(|d| d.source.as_str()).collect();
            error!(?sources, "no text to ingest");
            return Err(RagError::PipelineError(format!(
                "no text could be extracted from {}",
                sources.join(", ")
            )));
        }

        self.embed_chunks(&mut chunks).await.inspect_err(|e| {
            error!(collection, error = %e, "embedding failed during ingestion");
        })?;

        self.replace_collection(collection, &chunks).await.inspect_err(|e| {
            error!(collection, error = %e, "writing collection failed");
        })?;

        info!(collection, chunk_count = chunks.len(), "ingestion complete");
        Ok(chunks.len())
    }

    async fn embed_chunks(&self, chunks: &mut [Chunk]) -> Result<()> {
        let provider = self.embedding_provider.name().to_string();
        let dimensions = self.embedding_provider.dimensions();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await?;

        if embeddings.len() != chunks.len() {
            return Err(RagError::EmbeddingError {
                provider,
                message: format!("{} embeddings for {} chunks", embeddings.len(), chunks.len()),
            });
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimensions) {
            return Err(RagError::EmbeddingError {
                provider,
                message: format!("expected {dimensions} dimensions, got {}", bad.len()),
            });
        }

        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }
        Ok(())
    }

    async fn replace_collection(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        if self.vector_store.collection_exists(collection).await? {
            self.vector_store.delete_collection(collection).await?;
            info!(collection, "deleted existing collection");
        }

        let write = async {
            self.vector_store
                .create_collection(collection, self.embedding_provider.dimensions())
                .await?;
            self.vector_store.upsert(collection, chunks).await
        };
        write.await.map_err(|e| match e {
            RagError::VectorStoreError { backend, message } => RagError::VectorStoreError {
                backend,
                message: format!(
                    "{message} (collection '{collection}' was cleared before the failure)"
                ),
            },
            other => other,
        })
    }
}

/// Builder for constructing an [`IngestionPipeline`].
///
/// `embedding_provider` and `vector_store` are required. The chunker
/// defaults to a [`FixedSizeChunker`] sized from the config and the loader
/// to [`FileLoader`].
#[derive(Default)]
pub struct IngestionPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    loader: Option<Arc<dyn DocumentLoader>>,
}

impl IngestionPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Replace the default chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Replace the default file loader.
    pub fn loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Build the [`IngestionPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing or the
    /// config is invalid.
    pub fn build(self) -> Result<IngestionPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::Config("vector_store is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap))
        });
        let loader = self.loader.unwrap_or_else(|| Arc::new(FileLoader::new()));

        Ok(IngestionPipeline { embedding_provider, vector_store, chunker, loader })
    }
}
