//! Tracing backend trait and an in-process implementation.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, TelemetryError};

/// Identifies one open trace run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceHandle {
    /// Run id, also used as the `trace_id` span field.
    pub id: Uuid,
    /// Run name, e.g. `get_answer`.
    pub name: String,
}

impl TraceHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), name: name.into() }
    }
}

/// A backend that records one trace run per wrapped call.
///
/// The caller opens a run with [`start_trace`](Tracer::start_trace), does its
/// work exactly once, then closes the run with
/// [`end_trace`](Tracer::end_trace). A failure of either call must not change
/// the result of the wrapped work.
#[async_trait]
pub trait Tracer: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Open a run named `name` with the call's inputs.
    async fn start_trace(&self, name: &str, inputs: Value) -> Result<TraceHandle>;

    /// Close a run with the call's outputs, or the error it ended with.
    async fn end_trace(&self, handle: &TraceHandle, outputs: Value, error: Option<&str>)
    -> Result<()>;
}

/// One run recorded by [`InMemoryTracer`].
#[derive(Debug, Clone, Serialize)]
pub struct TraceRecord {
    pub id: Uuid,
    pub name: String,
    pub inputs: Value,
    pub outputs: Option<Value>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// A [`Tracer`] that keeps runs in memory.
#[derive(Debug, Default)]
pub struct InMemoryTracer {
    records: Mutex<Vec<TraceRecord>>,
}

impl InMemoryTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All runs, in start order.
    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

#[async_trait]
impl Tracer for InMemoryTracer {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn start_trace(&self, name: &str, inputs: Value) -> Result<TraceHandle> {
        let handle = TraceHandle::new(name);
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(TraceRecord {
            id: handle.id,
            name: handle.name.clone(),
            inputs,
            outputs: None,
            error: None,
            started_at: Utc::now(),
            ended_at: None,
        });
        Ok(handle)
    }

    async fn end_trace(
        &self,
        handle: &TraceHandle,
        outputs: Value,
        error: Option<&str>,
    ) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let record = records.iter_mut().find(|r| r.id == handle.id).ok_or_else(|| {
            TelemetryError::Tracing {
                backend: "in-memory".into(),
                message: format!("unknown trace run {}", handle.id),
            }
        })?;
        record.outputs = Some(outputs);
        record.error = error.map(str::to_string);
        record.ended_at = Some(Utc::now());
        Ok(())
    }
}
