//! Error types for the `docchat-telemetry` crate.

use thiserror::Error;

/// Errors raised by tracing and tracking backends.
///
/// None of these ever reach a pipeline caller; they are logged as warnings.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A tracing backend call failed.
    #[error("Tracing error ({backend}): {message}")]
    Tracing {
        /// The tracing backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An experiment tracker call failed.
    #[error("Tracking error ({backend}): {message}")]
    Tracking {
        /// The tracker that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The backend rejected the credentials (HTTP 401/403).
    #[error("{backend} rejected the request as unauthorized (possibly invalid key)")]
    Unauthorized {
        /// The backend that rejected the request.
        backend: String,
    },

    /// The global subscriber could not be installed.
    #[error("Telemetry init error: {0}")]
    Init(String),
}

/// A convenience result type for telemetry calls.
pub type Result<T> = std::result::Result<T, TelemetryError>;
