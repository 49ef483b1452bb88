//! LangSmith tracing backend.
//!
//! Each trace run is created with `POST {endpoint}/runs` and closed with
//! `PATCH {endpoint}/runs/{id}`. A 401/403 answer maps to
//! [`TelemetryError::Unauthorized`] so the caller can tell a bad key apart
//! from an outage.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Result, TelemetryError};
use crate::tracer::{TraceHandle, Tracer};

/// The public LangSmith API.
pub const DEFAULT_LANGSMITH_ENDPOINT: &str = "https://api.smith.langchain.com";

const BACKEND: &str = "LangSmith";

/// A [`Tracer`] that reports runs to a LangSmith-compatible API.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_telemetry::LangSmithTracer;
///
/// let tracer = LangSmithTracer::new(std::env::var("LANGSMITH_API_KEY")?)?
///     .with_project("docchat");
/// ```
pub struct LangSmithTracer {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    project: String,
}

impl LangSmithTracer {
    /// Create a tracer for the public endpoint and the `default` project.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(TelemetryError::Tracing {
                backend: BACKEND.into(),
                message: "API key must not be empty".into(),
            });
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: DEFAULT_LANGSMITH_ENDPOINT.to_string(),
            project: "default".to_string(),
        })
    }

    /// Point the tracer at another endpoint (self-hosted, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Record runs under `project`.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    async fn check(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TelemetryError::Unauthorized { backend: BACKEND.into() });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TelemetryError::Tracing {
                backend: BACKEND.into(),
                message: format!("API returned {status}: {body}"),
            });
        }
        Ok(())
    }

    fn transport(e: reqwest::Error) -> TelemetryError {
        TelemetryError::Tracing { backend: BACKEND.into(), message: format!("request failed: {e}") }
    }
}

#[async_trait]
impl Tracer for LangSmithTracer {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn start_trace(&self, name: &str, inputs: Value) -> Result<TraceHandle> {
        let handle = TraceHandle::new(name);
        let body = json!({
            "id": handle.id,
            "name": name,
            "run_type": "chain",
            "inputs": inputs,
            "start_time": Utc::now().to_rfc3339(),
            "session_name": self.project,
        });

        let response = self
            .client
            .post(format!("{}/runs", self.endpoint))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::transport)?;
        Self::check(response).await?;

        debug!(run_id = %handle.id, name, "langsmith run started");
        Ok(handle)
    }

    async fn end_trace(
        &self,
        handle: &TraceHandle,
        outputs: Value,
        error: Option<&str>,
    ) -> Result<()> {
        let body = json!({
            "outputs": outputs,
            "end_time": Utc::now().to_rfc3339(),
            "error": error,
        });

        let response = self
            .client
            .patch(format!("{}/runs/{}", self.endpoint, handle.id))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::transport)?;
        Self::check(response).await?;

        debug!(run_id = %handle.id, "langsmith run ended");
        Ok(())
    }
}
