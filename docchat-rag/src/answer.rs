//! Answering pipeline: retrieve → assemble prompt → generate.
//!
//! The core runs exactly once per question. Tracing and experiment tracking
//! are wrapped around it as best-effort steps: a trace that fails to start
//! leaves the call untraced, a trace or tracking call that fails later is
//! logged and dropped, and neither ever changes the returned outcome.

use std::fmt;
use std::sync::Arc;

use docchat_model::{Llm, ModelConfig};
use docchat_telemetry::{
    ExperimentTracker, RunStatus, TelemetryError, TelemetryToggles, TraceHandle, Tracer,
};
use serde::Serialize;
use serde_json::json;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::RagConfig;
use crate::document::RetrievalResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::prompt::PromptTemplate;
use crate::retrieval::Retriever;
use crate::vectorstore::VectorStore;

/// Name of the trace run wrapping each answer.
pub const TRACE_NAME: &str = "get_answer";

/// Where an answering call is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerStage {
    Start,
    Retrieving,
    Prompting,
    Generating,
    Done,
    Error,
}

impl AnswerStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerStage::Start => "start",
            AnswerStage::Retrieving => "retrieving",
            AnswerStage::Prompting => "prompting",
            AnswerStage::Generating => "generating",
            AnswerStage::Done => "done",
            AnswerStage::Error => "error",
        }
    }
}

impl fmt::Display for AnswerStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of an answering call, serialised as `{"answer", "sources"}`
/// or `{"error"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnswerOutcome {
    Answered { answer: String, sources: Vec<String> },
    Failed { error: String },
}

impl AnswerOutcome {
    pub fn answer(&self) -> Option<&str> {
        match self {
            Self::Answered { answer, .. } => Some(answer),
            Self::Failed { .. } => None,
        }
    }

    pub fn sources(&self) -> &[String] {
        match self {
            Self::Answered { sources, .. } => sources,
            Self::Failed { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Answered { .. } => None,
            Self::Failed { error } => Some(error),
        }
    }
}

impl From<&Result<GeneratedAnswer>> for AnswerOutcome {
    fn from(result: &Result<GeneratedAnswer>) -> Self {
        match result {
            Ok(generated) => Self::Answered {
                answer: generated.answer.clone(),
                sources: generated.retrieval.sources.iter().cloned().collect(),
            },
            Err(e) => Self::Failed { error: e.to_string() },
        }
    }
}

/// Output of the untraced core: the answer and the retrieval behind it.
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub retrieval: RetrievalResult,
}

/// An [`AnswerOutcome`] plus the retrieved chunk texts, for evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerReport {
    pub outcome: AnswerOutcome,
    /// Empty when the call failed.
    pub contexts: Vec<String>,
}

/// Answers questions over one collection.
///
/// Construct one via [`AnsweringPipeline::builder()`].
pub struct AnsweringPipeline {
    retriever: Retriever,
    llm: Arc<dyn Llm>,
    model_config: ModelConfig,
    template: PromptTemplate,
    tracer: Option<Arc<dyn Tracer>>,
    tracker: Option<Arc<dyn ExperimentTracker>>,
    toggles: TelemetryToggles,
}

impl AnsweringPipeline {
    /// Create a new [`AnsweringPipelineBuilder`].
    pub fn builder() -> AnsweringPipelineBuilder {
        AnsweringPipelineBuilder::default()
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.model_config
    }

    pub fn toggles(&self) -> TelemetryToggles {
        self.toggles
    }

    /// Answer `question`. Never fails: errors come back as
    /// [`AnswerOutcome::Failed`].
    pub async fn answer(&self, question: &str) -> AnswerOutcome {
        self.answer_detailed(question).await.outcome
    }

    /// Like [`answer`](Self::answer), also returning the retrieved contexts.
    pub async fn answer_detailed(&self, question: &str) -> AnswerReport {
        let span = info_span!(
            "docchat.answer",
            trace_id = %Uuid::new_v4(),
            collection = %self.retriever.collection()
        );
        async {
            let trace = self.begin_trace(question).await;
            let tracking = self.begin_tracking(question).await;

            let result = self.generate_with(question, &self.model_config, &self.template).await;
            let outcome = AnswerOutcome::from(&result);

            if tracking {
                self.finish_tracking(&result).await;
            }
            if let Some(handle) = trace {
                self.finish_trace(&handle, &outcome).await;
            }

            let contexts =
                result.as_ref().map(|generated| generated.retrieval.contexts()).unwrap_or_default();
            AnswerReport { outcome, contexts }
        }
        .instrument(span)
        .await
    }

    /// The untraced core: retrieve once, render `template`, generate with
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns the retriever's error, or [`RagError::Generation`].
    pub async fn generate_with(
        &self,
        question: &str,
        config: &ModelConfig,
        template: &PromptTemplate,
    ) -> Result<GeneratedAnswer> {
        let mut stage = AnswerStage::Start;
        debug!(%stage, "answer stage");

        let result = async {
            stage = AnswerStage::Retrieving;
            debug!(%stage, "answer stage");
            let retrieval = self.retriever.retrieve(question).await?;

            stage = AnswerStage::Prompting;
            debug!(%stage, "answer stage");
            let prompt = template.assemble(&retrieval.chunks, question);

            stage = AnswerStage::Generating;
            debug!(%stage, "answer stage");
            let span = info_span!(
                "docchat.generate",
                llm = self.llm.name(),
                model = %config.model_name,
                temperature = f64::from(config.temperature),
                prompt_chars = prompt.chars().count()
            );
            let answer = self.llm.generate(&prompt, config).instrument(span).await?;

            Ok::<_, RagError>(GeneratedAnswer { answer, retrieval })
        }
        .await;

        match &result {
            Ok(generated) => {
                debug!(stage = %AnswerStage::Done, source_count = generated.retrieval.sources.len(), "answer stage");
            }
            Err(e) => {
                warn!(stage = %AnswerStage::Error, failed_stage = %stage, error = %e, "answering failed");
            }
        }
        result
    }

    async fn begin_trace(&self, question: &str) -> Option<TraceHandle> {
        if !self.toggles.tracing_enabled {
            return None;
        }
        let tracer = self.tracer.as_ref()?;
        match tracer.start_trace(TRACE_NAME, json!({ "question": question })).await {
            Ok(handle) => Some(handle),
            Err(e @ TelemetryError::Unauthorized { .. }) => {
                warn!(tracer = tracer.name(), error = %e, "tracing failed (possibly invalid key), running without tracing");
                None
            }
            Err(e) => {
                warn!(tracer = tracer.name(), error = %e, "tracing failed, running without tracing");
                None
            }
        }
    }

    async fn finish_trace(&self, handle: &TraceHandle, outcome: &AnswerOutcome) {
        let Some(tracer) = &self.tracer else {
            return;
        };
        let outputs = serde_json::to_value(outcome).unwrap_or_default();
        if let Err(e) = tracer.end_trace(handle, outputs, outcome.error()).await {
            warn!(tracer = tracer.name(), run_id = %handle.id, error = %e, "failed to close trace run");
        }
    }

    /// Start a nested run and log the question. Returns whether a run is open.
    async fn begin_tracking(&self, question: &str) -> bool {
        if !self.toggles.tracking_enabled {
            return false;
        }
        let Some(tracker) = &self.tracker else {
            return false;
        };
        if let Err(e) = tracker.start_run(None, true).await {
            warn!(tracker = tracker.name(), error = %e, "failed to start tracking run");
            return false;
        }
        best_effort(tracker.as_ref(), "log question", tracker.log_param("question", question).await);
        true
    }

    async fn finish_tracking(&self, result: &Result<GeneratedAnswer>) {
        let Some(tracker) = &self.tracker else {
            return;
        };
        let tracker = tracker.as_ref();
        let status = match result {
            Ok(generated) => {
                best_effort(tracker, "log answer", tracker.log_param("answer", &generated.answer).await);
                let source_count = generated.retrieval.sources.len() as f64;
                best_effort(
                    tracker,
                    "log source count",
                    tracker.log_metric("source_count", source_count).await,
                );
                RunStatus::Finished
            }
            Err(e) => {
                best_effort(tracker, "log error", tracker.log_text(&e.to_string(), "error.txt").await);
                RunStatus::Failed
            }
        };
        best_effort(tracker, "end run", tracker.end_run(status).await);
        info!(status = status.as_str(), "tracking run closed");
    }
}

fn best_effort(
    tracker: &dyn ExperimentTracker,
    action: &str,
    result: docchat_telemetry::Result<()>,
) {
    if let Err(e) = result {
        warn!(tracker = tracker.name(), action, error = %e, "experiment tracking call failed");
    }
}

/// Builder for constructing an [`AnsweringPipeline`].
///
/// `embedding_provider`, `vector_store`, `collection` and `llm` are
/// required. Tracing and tracking only happen when both the collaborator is
/// set and [`TelemetryToggles`] enables it.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = AnsweringPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(HashEmbeddingProvider::new()))
///     .vector_store(store)
///     .collection("primmod_paper")
///     .llm(Arc::new(OpenAIClient::new(OpenAIConfig::from_env()?)?))
///     .tracker(Arc::new(tracker))
///     .toggles(toggles)
///     .build()?;
/// ```
#[derive(Default)]
pub struct AnsweringPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    collection: Option<String>,
    llm: Option<Arc<dyn Llm>>,
    model_config: Option<ModelConfig>,
    template: Option<PromptTemplate>,
    tracer: Option<Arc<dyn Tracer>>,
    tracker: Option<Arc<dyn ExperimentTracker>>,
    toggles: TelemetryToggles,
}

impl AnsweringPipelineBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn llm(mut self, llm: Arc<dyn Llm>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Generator configuration for [`answer`](AnsweringPipeline::answer).
    /// Defaults to [`ModelConfig::default`].
    pub fn model_config(mut self, config: ModelConfig) -> Self {
        self.model_config = Some(config);
        self
    }

    /// Defaults to [`PromptTemplate::research_assistant`].
    pub fn template(mut self, template: PromptTemplate) -> Self {
        self.template = Some(template);
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn tracker(mut self, tracker: Arc<dyn ExperimentTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Resolved once at startup; see [`TelemetryToggles::resolve`].
    pub fn toggles(mut self, toggles: TelemetryToggles) -> Self {
        self.toggles = toggles;
        self
    }

    /// Build the [`AnsweringPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing or a
    /// configuration is invalid.
    pub fn build(self) -> Result<AnsweringPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let model_config = self.model_config.unwrap_or_default();
        model_config.validate().map_err(|e| RagError::Config(e.to_string()))?;

        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::Config("vector_store is required".to_string()))?;
        let collection =
            self.collection.ok_or_else(|| RagError::Config("collection is required".to_string()))?;
        let llm = self.llm.ok_or_else(|| RagError::Config("llm is required".to_string()))?;

        Ok(AnsweringPipeline {
            retriever: Retriever::new(embedding_provider, vector_store, collection, &config),
            llm,
            model_config,
            template: self.template.unwrap_or_default(),
            tracer: self.tracer,
            tracker: self.tracker,
            toggles: self.toggles,
        })
    }
}
