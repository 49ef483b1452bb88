//! # docchat-telemetry
//!
//! Logging and the two optional observability collaborators of the answering
//! pipeline.
//!
//! - [`init_telemetry`] / [`init_with_storage`] install the `tracing`
//!   subscriber (env filter + fmt, optionally an in-memory span capture).
//! - [`Tracer`] wraps one answering call in a trace run. [`LangSmithTracer`]
//!   talks to a LangSmith-compatible HTTP API; [`InMemoryTracer`] keeps runs
//!   in process.
//! - [`ExperimentTracker`] records params, metrics and text artifacts.
//!   [`MlflowTracker`] talks to the MLflow REST API; [`InMemoryTracker`]
//!   keeps runs in process.
//! - [`TelemetryToggles`] is resolved once at startup and handed to the
//!   pipeline.
//!
//! Both collaborators are best-effort: every method returns a
//! [`TelemetryError`] and callers are expected to log and drop it.

mod error;
mod langsmith;
pub mod memory;
mod mlflow;
mod toggles;
mod tracer;
mod tracking;

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{Result, TelemetryError};
pub use langsmith::{DEFAULT_LANGSMITH_ENDPOINT, LangSmithTracer};
pub use memory::{InMemoryTraceLayer, SharedTraceStorage, SpanData};
pub use mlflow::MlflowTracker;
pub use toggles::TelemetryToggles;
pub use tracer::{InMemoryTracer, TraceHandle, TraceRecord, Tracer};
pub use tracking::{ExperimentTracker, InMemoryTracker, RunStatus, TrackedRun};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global `tracing` subscriber: `RUST_LOG` filter (default
/// `info`) and a human-readable fmt layer.
///
/// # Errors
///
/// Returns [`TelemetryError::Init`] if a global subscriber is already set.
pub fn init_telemetry(service_name: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;
    tracing::debug!(service.name = service_name, "telemetry initialized");
    Ok(())
}

/// Like [`init_telemetry`], and additionally capture closed spans into
/// `storage`.
///
/// # Errors
///
/// Returns [`TelemetryError::Init`] if a global subscriber is already set.
pub fn init_with_storage(service_name: &str, storage: Arc<SharedTraceStorage>) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(InMemoryTraceLayer::new(storage))
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;
    tracing::debug!(service.name = service_name, "telemetry initialized with span capture");
    Ok(())
}
