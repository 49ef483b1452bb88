//! In-process span capture.
//!
//! [`InMemoryTraceLayer`] is a `tracing_subscriber` layer that records every
//! closed span carrying a `trace_id` field (directly or inherited from a
//! parent span) into a [`SharedTraceStorage`]. The CLI uses it to dump the
//! spans of a session to a JSON file when no remote tracer is configured.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use serde::Serialize;
use tracing::{Id, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

/// Span fields copied from a parent span into its children.
const PROPAGATED_KEYS: [&str; 2] = ["trace_id", "collection"];

/// Data for a captured span.
#[derive(Debug, Clone, Serialize)]
pub struct SpanData {
    #[serde(rename = "span_id")]
    pub id: String,
    pub trace_id: String,
    pub name: String,
    #[serde(rename = "parent_span_id", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Nanoseconds since the Unix epoch.
    pub start_time: u128,
    pub end_time: u128,
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Shared storage for captured spans, keyed by trace id.
#[derive(Debug, Clone, Default)]
pub struct SharedTraceStorage {
    traces: Arc<RwLock<BTreeMap<String, Vec<SpanData>>>>,
}

impl SharedTraceStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spans recorded under `trace_id`, in close order.
    pub fn get_trace(&self, trace_id: &str) -> Option<Vec<SpanData>> {
        self.traces.read().ok()?.get(trace_id).cloned()
    }

    pub fn add_span(&self, span: SpanData) {
        if let Ok(mut traces) = self.traces.write() {
            traces.entry(span.trace_id.clone()).or_default().push(span);
        }
    }

    /// Every captured trace, ordered by trace id.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<SpanData>> {
        self.traces.read().map(|traces| traces.clone()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.read().map(|traces| traces.is_empty()).unwrap_or(true)
    }
}

/// A tracing layer that captures spans in memory.
pub struct InMemoryTraceLayer {
    storage: Arc<SharedTraceStorage>,
}

impl InMemoryTraceLayer {
    pub fn new(storage: Arc<SharedTraceStorage>) -> Self {
        Self { storage }
    }
}

#[derive(Clone)]
struct SpanFields(HashMap<String, serde_json::Value>);

#[derive(Clone, Copy)]
struct StartTime(u128);

fn now_nanos() -> u128 {
    SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_nanos()
}

impl<S> Layer<S> for InMemoryTraceLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);
        let mut fields = visitor.0;

        if let Some(parent) = span.parent() {
            if let Some(parent_fields) = parent.extensions().get::<SpanFields>() {
                for key in PROPAGATED_KEYS {
                    if !fields.contains_key(key) {
                        if let Some(value) = parent_fields.0.get(key) {
                            fields.insert(key.to_string(), value.clone());
                        }
                    }
                }
            }
        }

        let mut extensions = span.extensions_mut();
        extensions.insert(StartTime(now_nanos()));
        extensions.insert(SpanFields(fields));
    }

    fn on_record(&self, id: &Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            let mut visitor = JsonVisitor::default();
            values.record(&mut visitor);
            fields.0.extend(visitor.0);
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else {
            return;
        };
        let extensions = span.extensions();
        let fields = extensions.get::<SpanFields>().map(|f| f.0.clone()).unwrap_or_default();

        // Spans outside an answering/ingestion trace are not interesting here.
        let Some(trace_id) = fields.get("trace_id").and_then(|v| v.as_str()).map(str::to_string)
        else {
            return;
        };

        self.storage.add_span(SpanData {
            id: format!("{:016x}", id.into_u64()),
            trace_id,
            name: span.metadata().name().to_string(),
            parent_id: span.parent().map(|p| format!("{:016x}", p.id().into_u64())),
            start_time: extensions.get::<StartTime>().map(|t| t.0).unwrap_or(0),
            end_time: now_nanos(),
            attributes: fields,
        });
    }
}

#[derive(Default)]
struct JsonVisitor(HashMap<String, serde_json::Value>);

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }
}
