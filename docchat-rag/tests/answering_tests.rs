//! Answering pipeline behaviour, including best-effort tracing and tracking.

use std::sync::Arc;

use async_trait::async_trait;
use docchat_model::{Llm, MockLlm, ModelConfig, ModelError};
use docchat_rag::prompt::join_context;
use docchat_rag::{
    AnswerOutcome, AnsweringPipeline, Document, HashEmbeddingProvider, InMemoryVectorStore,
    IngestionPipeline, Page, PromptTemplate, RagConfig,
};
use docchat_telemetry::{
    ExperimentTracker, InMemoryTracer, InMemoryTracker, RunStatus, TelemetryError,
    TelemetryToggles, TraceHandle, Tracer,
};
use serde_json::{Value, json};

const UNRELATED: &str = "Who won the 1998 football world cup?";
const RELATED: &str = "What are primitives?";
const MISSING_REPLY: &str =
    "The provided context does not mention the 1998 World Cup, so the winner is missing from it.";

fn placeholder(len: usize, word: &str) -> String {
    let mut text = String::new();
    while text.len() < len {
        text.push_str(word);
        text.push(' ');
    }
    text.truncate(len);
    text
}

async fn ingested_store() -> Arc<InMemoryVectorStore> {
    let store = Arc::new(InMemoryVectorStore::new());
    let document = Document::new(
        "primmod.pdf",
        vec![
            Page { number: 1, text: placeholder(1400, "primitives") },
            Page { number: 2, text: placeholder(1400, "modeling") },
            Page { number: 3, text: placeholder(700, "workshop") },
        ],
    );
    IngestionPipeline::builder()
        .embedding_provider(Arc::new(HashEmbeddingProvider::new()))
        .vector_store(store.clone())
        .build()
        .unwrap()
        .ingest_documents(&[document], "primmod_paper")
        .await
        .unwrap();
    store
}

struct Setup {
    llm: Arc<MockLlm>,
    tracer: Option<Arc<dyn Tracer>>,
    tracker: Option<Arc<dyn ExperimentTracker>>,
    toggles: TelemetryToggles,
}

impl Setup {
    fn new(llm: MockLlm) -> Self {
        Self { llm: Arc::new(llm), tracer: None, tracker: None, toggles: TelemetryToggles::disabled() }
    }

    fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self.toggles.tracing_enabled = true;
        self
    }

    fn tracker(mut self, tracker: Arc<dyn ExperimentTracker>) -> Self {
        self.tracker = Some(tracker);
        self.toggles.tracking_enabled = true;
        self
    }

    fn build(&self, store: Arc<InMemoryVectorStore>) -> AnsweringPipeline {
        let mut builder = AnsweringPipeline::builder()
            .config(RagConfig::builder().similarity_threshold(0.1).build().unwrap())
            .embedding_provider(Arc::new(HashEmbeddingProvider::new()))
            .vector_store(store)
            .collection("primmod_paper")
            .llm(self.llm.clone())
            .toggles(self.toggles);
        if let Some(tracer) = &self.tracer {
            builder = builder.tracer(tracer.clone());
        }
        if let Some(tracker) = &self.tracker {
            builder = builder.tracker(tracker.clone());
        }
        builder.build().unwrap()
    }
}

/// Fails either when opening or when closing a trace run.
struct BrokenTracer {
    fail_on_start: bool,
}

#[async_trait]
impl Tracer for BrokenTracer {
    fn name(&self) -> &str {
        "broken"
    }

    async fn start_trace(&self, name: &str, _inputs: Value) -> docchat_telemetry::Result<TraceHandle> {
        if self.fail_on_start {
            return Err(TelemetryError::Unauthorized { backend: "broken".into() });
        }
        Ok(TraceHandle::new(name))
    }

    async fn end_trace(
        &self,
        _handle: &TraceHandle,
        _outputs: Value,
        _error: Option<&str>,
    ) -> docchat_telemetry::Result<()> {
        Err(TelemetryError::Tracing { backend: "broken".into(), message: "403 Forbidden".into() })
    }
}

/// Accepts runs but fails every logging call.
struct BrokenTracker;

fn tracking_down() -> TelemetryError {
    TelemetryError::Tracking { backend: "broken".into(), message: "connection refused".into() }
}

#[async_trait]
impl ExperimentTracker for BrokenTracker {
    fn name(&self) -> &str {
        "broken"
    }
    async fn probe(&self) -> docchat_telemetry::Result<()> {
        Ok(())
    }
    async fn start_run(&self, _: Option<&str>, _: bool) -> docchat_telemetry::Result<String> {
        Ok("run".into())
    }
    async fn log_param(&self, _: &str, _: &str) -> docchat_telemetry::Result<()> {
        Err(tracking_down())
    }
    async fn log_metric(&self, _: &str, _: f64) -> docchat_telemetry::Result<()> {
        Err(tracking_down())
    }
    async fn log_text(&self, _: &str, _: &str) -> docchat_telemetry::Result<()> {
        Err(tracking_down())
    }
    async fn end_run(&self, _: RunStatus) -> docchat_telemetry::Result<()> {
        Err(tracking_down())
    }
}

#[tokio::test]
async fn unrelated_question_gets_missing_information_answer_and_no_sources() {
    let setup = Setup::new(MockLlm::new(MISSING_REPLY));
    let pipeline = setup.build(ingested_store().await);

    let report = pipeline.answer_detailed(UNRELATED).await;

    assert_eq!(report.outcome.answer(), Some(MISSING_REPLY));
    assert!(report.outcome.sources().is_empty());
    assert!(report.contexts.is_empty());
    let prompts = setup.llm.prompts();
    let prompt = &prompts[0];
    assert!(prompt.contains(&format!("Context:\n\n\nQuestion: {UNRELATED}")));
}

#[tokio::test]
async fn related_question_uses_retrieved_context_and_sources() {
    let setup = Setup::new(MockLlm::new("Primitives are basic shapes."));
    let pipeline = setup.build(ingested_store().await);

    let outcome = pipeline.answer(RELATED).await;

    assert_eq!(
        serde_json::to_value(&outcome).unwrap(),
        json!({"answer": "Primitives are basic shapes.", "sources": ["primmod.pdf"]})
    );
    let calls = setup.llm.calls();
    let call = &calls[0];
    assert!(call.prompt.contains("primitives primitives"));
    assert!(!call.prompt.contains("workshop"));
    assert_eq!(call.config, ModelConfig::default());
}

#[tokio::test]
async fn generation_failure_becomes_an_error_outcome() {
    let setup = Setup::new(MockLlm::failing("connection reset"));
    let pipeline = setup.build(ingested_store().await);

    let outcome = pipeline.answer(RELATED).await;

    assert!(matches!(outcome, AnswerOutcome::Failed { .. }));
    assert!(outcome.error().unwrap().contains("connection reset"));
    let value = serde_json::to_value(&outcome).unwrap();
    assert_eq!(value.as_object().unwrap().len(), 1);
    assert!(value.get("answer").is_none());
}

#[tokio::test]
async fn missing_collection_is_an_error_outcome() {
    let setup = Setup::new(MockLlm::new("unused"));
    let pipeline = setup.build(Arc::new(InMemoryVectorStore::new()));

    let outcome = pipeline.answer(RELATED).await;

    assert!(outcome.error().unwrap().contains("collection 'primmod_paper' does not exist"));
    assert!(setup.llm.calls().is_empty());
}

#[tokio::test]
async fn repeated_questions_retrieve_the_same_ranking() {
    let setup = Setup::new(MockLlm::new("same"));
    let pipeline = setup.build(ingested_store().await);

    let first = pipeline.retriever().retrieve(RELATED).await.unwrap();
    let second = pipeline.retriever().retrieve(RELATED).await.unwrap();
    let ids = |r: &docchat_rag::RetrievalResult| {
        r.chunks.iter().map(|c| c.chunk.id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(pipeline.answer(RELATED).await, pipeline.answer(RELATED).await);
}

#[tokio::test]
async fn tracing_never_changes_the_outcome_and_core_runs_once() {
    let store = ingested_store().await;
    let baseline_setup = Setup::new(MockLlm::new("answer"));
    let baseline = baseline_setup.build(store.clone()).answer(RELATED).await;

    let recording = Arc::new(InMemoryTracer::new());
    let setups = [
        Setup::new(MockLlm::new("answer")).tracer(recording.clone()),
        Setup::new(MockLlm::new("answer")).tracer(Arc::new(BrokenTracer { fail_on_start: true })),
        Setup::new(MockLlm::new("answer")).tracer(Arc::new(BrokenTracer { fail_on_start: false })),
    ];

    for setup in &setups {
        let outcome = setup.build(store.clone()).answer(RELATED).await;
        assert_eq!(outcome, baseline);
        assert_eq!(setup.llm.calls().len(), 1);
    }

    let records = recording.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "get_answer");
    assert_eq!(records[0].inputs, json!({"question": RELATED}));
    assert_eq!(records[0].outputs.as_ref(), Some(&serde_json::to_value(&baseline).unwrap()));
}

#[tokio::test]
async fn tracing_records_the_error_of_a_failed_call() {
    let recording = Arc::new(InMemoryTracer::new());
    let setup = Setup::new(MockLlm::failing("connection reset")).tracer(recording.clone());

    let outcome = setup.build(ingested_store().await).answer(RELATED).await;

    assert_eq!(recording.records()[0].error.as_deref(), outcome.error());
}

#[tokio::test]
async fn tracking_logs_question_answer_and_source_count_in_a_nested_run() {
    let tracker = Arc::new(InMemoryTracker::new());
    let setup = Setup::new(MockLlm::new("Primitives are basic shapes.")).tracker(tracker.clone());
    let pipeline = setup.build(ingested_store().await);

    let outer = tracker.start_run(Some("session"), false).await.unwrap();
    pipeline.answer(RELATED).await;
    tracker.end_run(RunStatus::Finished).await.unwrap();

    let runs = tracker.runs();
    assert_eq!(runs.len(), 2);
    let run = &runs[1];
    assert_eq!(run.parent_id.as_deref(), Some(outer.as_str()));
    assert_eq!(run.params["question"], RELATED);
    assert_eq!(run.params["answer"], "Primitives are basic shapes.");
    assert_eq!(run.metrics["source_count"], vec![1.0]);
    assert_eq!(run.status, Some(RunStatus::Finished));
}

#[tokio::test]
async fn tracking_records_failures_as_error_text() {
    let tracker = Arc::new(InMemoryTracker::new());
    let setup = Setup::new(MockLlm::failing("connection reset")).tracker(tracker.clone());

    setup.build(ingested_store().await).answer(RELATED).await;

    let runs = tracker.runs();
    let run = &runs[0];
    assert!(run.texts["error.txt"].contains("connection reset"));
    assert!(!run.params.contains_key("answer"));
    assert_eq!(run.status, Some(RunStatus::Failed));
}

#[tokio::test]
async fn broken_tracker_does_not_change_the_outcome() {
    let store = ingested_store().await;
    let plain = Setup::new(MockLlm::new("answer")).build(store.clone()).answer(RELATED).await;
    let tracked = Setup::new(MockLlm::new("answer"))
        .tracker(Arc::new(BrokenTracker))
        .build(store)
        .answer(RELATED)
        .await;
    assert_eq!(plain, tracked);
}

#[tokio::test]
async fn disabled_toggles_keep_collaborators_silent() {
    let tracer = Arc::new(InMemoryTracer::new());
    let tracker = Arc::new(InMemoryTracker::new());
    let mut setup = Setup::new(MockLlm::new("answer")).tracer(tracer.clone()).tracker(tracker.clone());
    setup.toggles = TelemetryToggles::disabled();

    setup.build(ingested_store().await).answer(RELATED).await;

    assert!(tracer.records().is_empty());
    assert!(tracker.runs().is_empty());
}

#[tokio::test]
async fn generate_with_uses_the_given_config_and_template() {
    let setup = Setup::new(MockLlm::with_responder(|_, config| format!("t={}", config.temperature)));
    let pipeline = setup.build(ingested_store().await);

    let config = ModelConfig::default().with_temperature(0.9);
    let generated = pipeline.generate_with(RELATED, &config, &PromptTemplate::concise()).await.unwrap();

    assert_eq!(generated.answer, "t=0.9");
    assert!(setup.llm.prompts()[0].starts_with("Answer based on context:\n"));
    assert_eq!(generated.retrieval.sources.len(), 1);
}

/// Rejects any prompt longer than `limit` characters, like a model with a
/// small input window.
struct WindowedLlm {
    limit: usize,
}

#[async_trait]
impl Llm for WindowedLlm {
    fn name(&self) -> &str {
        "windowed"
    }

    async fn generate(&self, prompt: &str, _config: &ModelConfig) -> docchat_model::Result<String> {
        if prompt.len() > self.limit {
            return Err(ModelError::Api {
                provider: "windowed".into(),
                message: format!("context length exceeded: {} > {}", prompt.len(), self.limit),
            });
        }
        Ok("fits".into())
    }
}

async fn long_page_store() -> Arc<InMemoryVectorStore> {
    let store = Arc::new(InMemoryVectorStore::new());
    let pages = (1..=6)
        .map(|number| Page { number, text: placeholder(1000, &format!("primitives page{number}")) })
        .collect();
    IngestionPipeline::builder()
        .embedding_provider(Arc::new(HashEmbeddingProvider::new()))
        .vector_store(store.clone())
        .build()
        .unwrap()
        .ingest_documents(&[Document::new("long.pdf", pages)], "long_pages")
        .await
        .unwrap();
    store
}

fn long_page_pipeline(store: Arc<InMemoryVectorStore>, llm: Arc<dyn Llm>) -> AnsweringPipeline {
    AnsweringPipeline::builder()
        .config(RagConfig::builder().top_k(3).build().unwrap())
        .embedding_provider(Arc::new(HashEmbeddingProvider::new()))
        .vector_store(store)
        .collection("long_pages")
        .llm(llm)
        .toggles(TelemetryToggles::disabled())
        .build()
        .unwrap()
}

#[tokio::test]
async fn prompt_carries_every_retrieved_chunk_in_full() {
    let llm = Arc::new(MockLlm::new("ok"));
    let pipeline = long_page_pipeline(long_page_store().await, llm.clone());

    let retrieval = pipeline.retriever().retrieve(RELATED).await.unwrap();
    assert_eq!(retrieval.chunks.len(), 3);
    assert!(retrieval.chunks.iter().all(|r| r.chunk.text.chars().count() == 1000));

    pipeline.answer(RELATED).await;
    let prompts = llm.prompts();
    let prompt = &prompts[0];
    assert!(prompt.contains(&join_context(&retrieval.chunks)));
    assert!(prompt.len() > 3 * 1000 + 2 * "\n\n".len());
}

#[tokio::test]
async fn oversized_prompt_fails_in_the_generator() {
    let pipeline = long_page_pipeline(long_page_store().await, Arc::new(WindowedLlm { limit: 2000 }));

    let outcome = pipeline.answer(RELATED).await;

    assert!(matches!(outcome, AnswerOutcome::Failed { .. }));
    let error = outcome.error().unwrap();
    assert!(error.starts_with("Generation API error (windowed): context length exceeded"));
    assert!(!error.starts_with("Pipeline error"));
}
