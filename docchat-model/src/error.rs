//! Error types for the `docchat-model` crate.

use thiserror::Error;

/// Errors raised by a generation backend.
///
/// Every variant renders with the provider's own message so callers can
/// surface it verbatim.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The request never produced a response (connection, DNS, TLS, timeout).
    #[error("Generation transport error ({provider}): {message}")]
    Transport {
        /// The backend that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The backend answered with an error (quota, auth, bad request).
    #[error("Generation API error ({provider}): {message}")]
    Api {
        /// The backend that produced the error.
        provider: String,
        /// The backend's error message.
        message: String,
    },

    /// The backend answered successfully but without any text.
    #[error("Generation error ({provider}): provider returned an empty completion")]
    EmptyResponse {
        /// The backend that produced the empty completion.
        provider: String,
    },

    /// The model configuration was rejected before any request was made.
    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),
}

/// A convenience result type for generation calls.
pub type Result<T> = std::result::Result<T, ModelError>;
