//! Experiment tracker trait and an in-process implementation.
//!
//! Trackers follow MLflow's active-run model: [`start_run`](ExperimentTracker::start_run)
//! pushes a run onto a stack, `log_*` calls apply to the top of the stack and
//! [`end_run`](ExperimentTracker::end_run) pops it. A nested run records the
//! run below it as its parent.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Result, TelemetryError};

/// Final state of a tracked run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Finished,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Finished => "FINISHED",
            RunStatus::Failed => "FAILED",
        }
    }
}

/// Records parameters, metrics and text artifacts of experiment runs.
#[async_trait]
pub trait ExperimentTracker: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Check the backend is reachable and ready. Called once at startup.
    async fn probe(&self) -> Result<()>;

    /// Start a run and make it active. With `nested`, the currently active
    /// run (if any) becomes its parent. Returns the run id.
    async fn start_run(&self, run_name: Option<&str>, nested: bool) -> Result<String>;

    /// Log a parameter on the active run.
    async fn log_param(&self, key: &str, value: &str) -> Result<()>;

    /// Log several parameters on the active run.
    async fn log_params(&self, params: &[(&str, String)]) -> Result<()> {
        for (key, value) in params {
            self.log_param(key, value).await?;
        }
        Ok(())
    }

    /// Log a metric value on the active run.
    async fn log_metric(&self, key: &str, value: f64) -> Result<()>;

    /// Store `text` as the artifact `artifact_file` of the active run.
    async fn log_text(&self, text: &str, artifact_file: &str) -> Result<()>;

    /// End the active run.
    async fn end_run(&self, status: RunStatus) -> Result<()>;
}

/// A run as recorded by [`InMemoryTracker`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedRun {
    pub id: String,
    pub name: Option<String>,
    pub parent_id: Option<String>,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, Vec<f64>>,
    pub texts: BTreeMap<String, String>,
    pub status: Option<RunStatus>,
}

#[derive(Debug, Default)]
struct TrackerState {
    runs: Vec<TrackedRun>,
    active: Vec<usize>,
}

/// An [`ExperimentTracker`] that keeps runs in memory.
#[derive(Debug, Default)]
pub struct InMemoryTracker {
    state: Mutex<TrackerState>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// All runs, in start order.
    pub fn runs(&self) -> Vec<TrackedRun> {
        self.lock().runs.clone()
    }

    /// Runs with the given name, in start order.
    pub fn runs_named(&self, name: &str) -> Vec<TrackedRun> {
        self.lock().runs.iter().filter(|r| r.name.as_deref() == Some(name)).cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_active<T>(&self, f: impl FnOnce(&mut TrackedRun) -> T) -> Result<T> {
        let mut state = self.lock();
        let index = *state.active.last().ok_or_else(|| TelemetryError::Tracking {
            backend: "in-memory".into(),
            message: "no active run".into(),
        })?;
        Ok(f(&mut state.runs[index]))
    }
}

#[async_trait]
impl ExperimentTracker for InMemoryTracker {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn probe(&self) -> Result<()> {
        Ok(())
    }

    async fn start_run(&self, run_name: Option<&str>, nested: bool) -> Result<String> {
        let mut state = self.lock();
        let parent_id = if nested {
            state.active.last().map(|&index| state.runs[index].id.clone())
        } else {
            None
        };
        let id = Uuid::new_v4().simple().to_string();
        state.runs.push(TrackedRun {
            id: id.clone(),
            name: run_name.map(str::to_string),
            parent_id,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            texts: BTreeMap::new(),
            status: None,
        });
        let index = state.runs.len() - 1;
        state.active.push(index);
        Ok(id)
    }

    async fn log_param(&self, key: &str, value: &str) -> Result<()> {
        self.with_active(|run| {
            run.params.insert(key.to_string(), value.to_string());
        })
    }

    async fn log_metric(&self, key: &str, value: f64) -> Result<()> {
        self.with_active(|run| run.metrics.entry(key.to_string()).or_default().push(value))
    }

    async fn log_text(&self, text: &str, artifact_file: &str) -> Result<()> {
        self.with_active(|run| {
            run.texts.insert(artifact_file.to_string(), text.to_string());
        })
    }

    async fn end_run(&self, status: RunStatus) -> Result<()> {
        let mut state = self.lock();
        let index = state.active.pop().ok_or_else(|| TelemetryError::Tracking {
            backend: "in-memory".into(),
            message: "no active run".into(),
        })?;
        state.runs[index].status = Some(status);
        Ok(())
    }
}
