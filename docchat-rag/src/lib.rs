//! # docchat-rag
//!
//! Question answering over a private document corpus.
//!
//! ## Overview
//!
//! Two flows share an [`EmbeddingProvider`] and a [`VectorStore`]:
//!
//! - **Ingestion** ([`IngestionPipeline`]): load a PDF page by page, split
//!   every page into overlapping fixed-size chunks, embed every chunk, then
//!   replace the named collection with the new chunks.
//! - **Answering** ([`AnsweringPipeline`]): embed the question, retrieve the
//!   `top_k` nearest chunks, render them into a prompt and ask an
//!   [`Llm`](docchat_model::Llm). Optional tracing and experiment tracking
//!   wrap each call without ever changing its result.
//!
//! Both entry points return boundary values ([`IngestOutcome`],
//! [`AnswerOutcome`]) that serialise to `{..}` or `{"error": ..}` instead of
//! failing.
//!
//! ## Features
//!
//! - `openai` (default) - [`OpenAIEmbeddingProvider`](openai::OpenAIEmbeddingProvider)
//! - `qdrant` - [`QdrantVectorStore`](qdrant::QdrantVectorStore)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docchat_model::MockLlm;
//! use docchat_rag::*;
//!
//! let embedder: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbeddingProvider::new());
//! let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
//!
//! let ingestion = IngestionPipeline::builder()
//!     .embedding_provider(embedder.clone())
//!     .vector_store(store.clone())
//!     .build()?;
//! ingestion.ingest("data/primmod.pdf", "primmod_paper").await;
//!
//! let answering = AnsweringPipeline::builder()
//!     .embedding_provider(embedder)
//!     .vector_store(store)
//!     .collection("primmod_paper")
//!     .llm(Arc::new(MockLlm::new("PrimMod is ...")))
//!     .build()?;
//! let outcome = answering.answer("What is PrimMod?").await;
//! ```

pub mod answer;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod hashing;
pub mod inmemory;
pub mod ingest;
pub mod loader;
pub mod prompt;
pub mod retrieval;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use answer::{
    AnswerOutcome, AnswerReport, AnswerStage, AnsweringPipeline, AnsweringPipelineBuilder,
    GeneratedAnswer,
};
pub use chunking::{Chunker, FixedSizeChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, Page, RetrievalResult, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use hashing::HashEmbeddingProvider;
pub use inmemory::InMemoryVectorStore;
pub use ingest::{IngestOutcome, IngestStatus, IngestionPipeline, IngestionPipelineBuilder};
pub use loader::{DocumentLoader, FileLoader};
pub use prompt::PromptTemplate;
pub use retrieval::Retriever;
pub use vectorstore::VectorStore;

#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
