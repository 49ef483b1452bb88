//! Error types for the `docchat-rag` crate.

use docchat_model::ModelError;
use thiserror::Error;

/// Errors that can occur in ingestion and answering.
#[derive(Debug, Error)]
pub enum RagError {
    /// The document path does not exist.
    #[error("Document not found: {path}")]
    NotFound {
        /// The path that was asked for.
        path: String,
    },

    /// The document exists but its text could not be extracted.
    #[error("Failed to load '{path}': {message}")]
    Load {
        /// The document path.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The generator failed.
    #[error(transparent)]
    Generation(#[from] ModelError),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error in the pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
