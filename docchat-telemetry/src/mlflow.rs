//! MLflow experiment tracker over the MLflow REST API.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Result, TelemetryError};
use crate::tracking::{ExperimentTracker, RunStatus};

const BACKEND: &str = "MLflow";

/// An [`ExperimentTracker`] backed by an MLflow tracking server.
///
/// [`probe`](ExperimentTracker::probe) resolves the experiment by name and
/// creates it when missing. Text artifacts are uploaded through the
/// artifact proxy (`mlflow server --serve-artifacts`, the default since 2.0).
///
/// # Example
///
/// ```rust,ignore
/// use docchat_telemetry::{ExperimentTracker, MlflowTracker};
///
/// let tracker = MlflowTracker::new("http://localhost:5000", "LLMops_Multi_Doc_Chat");
/// tracker.probe().await?;
/// ```
pub struct MlflowTracker {
    client: reqwest::Client,
    tracking_uri: String,
    experiment_name: String,
    experiment_id: Mutex<Option<String>>,
    active_runs: Mutex<Vec<String>>,
}

impl MlflowTracker {
    pub fn new(tracking_uri: impl Into<String>, experiment_name: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            tracking_uri: tracking_uri.into().trim_end_matches('/').to_string(),
            experiment_name: experiment_name.into(),
            experiment_id: Mutex::new(None),
            active_runs: Mutex::new(Vec::new()),
        }
    }

    /// The experiment id resolved by the last successful probe.
    pub fn experiment_id(&self) -> Option<String> {
        self.experiment_id.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    fn active_run(&self) -> Result<String> {
        self.active_runs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last()
            .cloned()
            .ok_or_else(|| tracking_error("no active run"))
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/2.0/mlflow/{path}", self.tracking_uri)
    }

    async fn read(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TelemetryError::Unauthorized { backend: BACKEND.into() });
        }
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(tracking_error(format!("API returned {status}: {body}")));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| tracking_error(format!("invalid response: {e}")))
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let response =
            self.client.post(self.api_url(path)).json(&body).send().await.map_err(transport)?;
        Self::read(response).await
    }

    async fn find_experiment(&self) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.api_url("experiments/get-by-name"))
            .query(&[("experiment_name", self.experiment_name.as_str())])
            .send()
            .await
            .map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = Self::read(response).await?;
        Ok(body["experiment"]["experiment_id"].as_str().map(str::to_string))
    }

    async fn create_experiment(&self) -> Result<String> {
        let body = self.post("experiments/create", json!({ "name": self.experiment_name })).await?;
        body["experiment_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| tracking_error("experiments/create returned no experiment_id"))
    }
}

fn tracking_error(message: impl Into<String>) -> TelemetryError {
    TelemetryError::Tracking { backend: BACKEND.into(), message: message.into() }
}

fn transport(e: reqwest::Error) -> TelemetryError {
    tracking_error(format!("request failed: {e}"))
}

#[async_trait]
impl ExperimentTracker for MlflowTracker {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn probe(&self) -> Result<()> {
        let id = match self.find_experiment().await? {
            Some(id) => id,
            None => self.create_experiment().await?,
        };
        debug!(experiment = %self.experiment_name, experiment_id = %id, "mlflow experiment ready");
        *self.experiment_id.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(id);
        Ok(())
    }

    async fn start_run(&self, run_name: Option<&str>, nested: bool) -> Result<String> {
        let experiment_id =
            self.experiment_id().ok_or_else(|| tracking_error("experiment not resolved; probe first"))?;

        let mut tags = Vec::new();
        if nested {
            if let Ok(parent) = self.active_run() {
                tags.push(json!({ "key": "mlflow.parentRunId", "value": parent }));
            }
        }

        let mut body = json!({
            "experiment_id": experiment_id,
            "start_time": Utc::now().timestamp_millis(),
            "tags": tags,
        });
        if let Some(name) = run_name {
            body["run_name"] = json!(name);
        }

        let response = self.post("runs/create", body).await?;
        let run_id = response["run"]["info"]["run_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| tracking_error("runs/create returned no run_id"))?;

        self.active_runs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(run_id.clone());
        debug!(run_id = %run_id, nested, "mlflow run started");
        Ok(run_id)
    }

    async fn log_param(&self, key: &str, value: &str) -> Result<()> {
        let run_id = self.active_run()?;
        self.post("runs/log-parameter", json!({ "run_id": run_id, "key": key, "value": value }))
            .await
            .map(|_| ())
    }

    async fn log_metric(&self, key: &str, value: f64) -> Result<()> {
        let run_id = self.active_run()?;
        self.post(
            "runs/log-metric",
            json!({
                "run_id": run_id,
                "key": key,
                "value": value,
                "timestamp": Utc::now().timestamp_millis(),
                "step": 0,
            }),
        )
        .await
        .map(|_| ())
    }

    async fn log_text(&self, text: &str, artifact_file: &str) -> Result<()> {
        let run_id = self.active_run()?;
        let experiment_id =
            self.experiment_id().ok_or_else(|| tracking_error("experiment not resolved; probe first"))?;
        let base = format!(
            "{}/api/2.0/mlflow-artifacts/artifacts/{experiment_id}/{run_id}/artifacts",
            self.tracking_uri
        );
        let mut url = reqwest::Url::parse(&base)
            .map_err(|e| tracking_error(format!("invalid artifact url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| tracking_error("tracking uri cannot carry a path"))?
            .extend(artifact_file.split('/'));
        let response =
            self.client.put(url).body(text.to_string()).send().await.map_err(transport)?;
        Self::read(response).await.map(|_| ())
    }

    async fn end_run(&self, status: RunStatus) -> Result<()> {
        let run_id = self
            .active_runs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop()
            .ok_or_else(|| tracking_error("no active run"))?;
        self.post(
            "runs/update",
            json!({
                "run_id": run_id,
                "status": status.as_str(),
                "end_time": Utc::now().timestamp_millis(),
            }),
        )
        .await
        .map(|_| ())
    }
}
