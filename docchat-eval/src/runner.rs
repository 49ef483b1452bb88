//! Evaluation and A/B runs over an [`AnsweringPipeline`].

use std::sync::Arc;

use docchat_model::ModelConfig;
use docchat_rag::{AnsweringPipeline, PromptTemplate};
use docchat_telemetry::{ExperimentTracker, RunStatus};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, info, info_span, warn};

use crate::case::EvalSet;
use crate::record::{Observation, RunRecord};
use crate::report::EvalReport;

/// Run name of the default evaluation.
pub const DEFAULT_EVALUATION_RUN: &str = "Initial RAG Evaluation";

/// A named generation configuration compared in an A/B test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbConfig {
    pub name: String,
    pub model: ModelConfig,
}

impl AbConfig {
    pub fn new(name: impl Into<String>, model: ModelConfig) -> Self {
        Self { name: name.into(), model }
    }

    /// Low against high temperature on `gpt-4o-mini`.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("GPT-4o-Mini-Low-Temp", ModelConfig::new("gpt-4o-mini", 0.1)),
            Self::new("GPT-4o-Mini-High-Temp", ModelConfig::new("gpt-4o-mini", 0.9)),
        ]
    }

    /// Tracking run name for this configuration.
    pub fn run_name(&self) -> String {
        format!("AB_Test_{}", self.name)
    }
}

/// Artifact name for an A/B answer: the first 20 characters of the question,
/// spaces replaced by underscores.
pub fn answer_artifact_name(question: &str) -> String {
    let prefix: String = question.chars().take(20).collect();
    format!("answer_{}.txt", prefix.replace(' ', "_"))
}

/// Drives evaluation sets through an answering pipeline and records one
/// [`RunRecord`] per question.
///
/// Tracking follows the pipeline's toggles: runs are only opened when the
/// pipeline has tracking enabled and a tracker is attached here. Tracker
/// failures are logged and never affect the records.
pub struct EvalRunner {
    pipeline: Arc<AnsweringPipeline>,
    tracker: Option<Arc<dyn ExperimentTracker>>,
}

impl EvalRunner {
    pub fn new(pipeline: Arc<AnsweringPipeline>) -> Self {
        Self { pipeline, tracker: None }
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn ExperimentTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    fn tracker(&self) -> Option<&dyn ExperimentTracker> {
        if !self.pipeline.toggles().tracking_enabled {
            return None;
        }
        self.tracker.as_deref()
    }

    /// Ask every case through the full pipeline, tracing and tracking
    /// included, under one top-level run named `run_name`.
    pub async fn run_evaluation(&self, run_name: &str, set: &EvalSet) -> EvalReport {
        let span = info_span!("docchat.eval", run_name, cases = set.len());
        async {
            let open = self.open_run(run_name).await;
            let config = self.pipeline.model_config().clone();

            let mut records = Vec::with_capacity(set.len());
            for case in set.cases() {
                info!(question = %case.question, "evaluating");
                let report = self.pipeline.answer_detailed(&case.question).await;
                let observed = Observation {
                    answer: report.outcome.answer().map(str::to_string),
                    error: report.outcome.error().map(str::to_string),
                    sources: report.outcome.sources().to_vec(),
                    contexts: report.contexts,
                };
                match (&observed.answer, &observed.error) {
                    (Some(answer), _) => info!(length = answer.chars().count(), "answer received"),
                    (None, Some(error)) => warn!(%error, "question failed"),
                    (None, None) => {}
                }
                records.push(RunRecord::new(
                    run_name,
                    "default",
                    &config,
                    &case.question,
                    case.expected_answer.as_deref(),
                    observed,
                ));
            }

            let report = EvalReport::new(records);
            if open {
                self.log_summary(&report).await;
                self.close_run(&report).await;
            }
            report
        }
        .instrument(span)
        .await
    }

    /// Answer every case under each configuration. Each configuration gets
    /// its own run named [`AbConfig::run_name`], with the model and
    /// temperature as parameters and each answer stored as a text artifact.
    pub async fn run_ab_test(&self, configs: &[AbConfig], set: &EvalSet) -> EvalReport {
        let template = PromptTemplate::concise();
        let mut records = Vec::with_capacity(configs.len() * set.len());

        for config in configs {
            let run_name = config.run_name();
            let span = info_span!("docchat.ab_test", config = %config.name);
            async {
                info!(model = %config.model.model_name, temperature = f64::from(config.model.temperature), "testing configuration");
                let open = self.open_run(&run_name).await;
                if open {
                    self.best_effort("log params", self.log_params(&config.model).await);
                }

                let mut config_records = Vec::with_capacity(set.len());
                for case in set.cases() {
                    let result =
                        self.pipeline.generate_with(&case.question, &config.model, &template).await;
                    let observed = match result {
                        Ok(generated) => Observation {
                            sources: generated.retrieval.sources.iter().cloned().collect(),
                            contexts: generated.retrieval.contexts(),
                            answer: Some(generated.answer),
                            error: None,
                        },
                        Err(e) => {
                            warn!(question = %case.question, error = %e, "question failed");
                            Observation { error: Some(e.to_string()), ..Default::default() }
                        }
                    };
                    if open {
                        if let (Some(tracker), Some(answer)) = (self.tracker(), &observed.answer) {
                            let artifact = answer_artifact_name(&case.question);
                            self.best_effort("log answer", tracker.log_text(answer, &artifact).await);
                        }
                    }
                    config_records.push(RunRecord::new(
                        &run_name,
                        &config.name,
                        &config.model,
                        &case.question,
                        case.expected_answer.as_deref(),
                        observed,
                    ));
                }

                if open {
                    let report = EvalReport::new(config_records.clone());
                    self.close_run(&report).await;
                }
                records.extend(config_records);
            }
            .instrument(span)
            .await;
        }
        EvalReport::new(records)
    }

    async fn open_run(&self, run_name: &str) -> bool {
        let Some(tracker) = self.tracker() else {
            return false;
        };
        match tracker.start_run(Some(run_name), false).await {
            Ok(run_id) => {
                info!(run_name, run_id = %run_id, "tracking run started");
                true
            }
            Err(e) => {
                warn!(tracker = tracker.name(), run_name, error = %e, "failed to start tracking run");
                false
            }
        }
    }

    async fn log_params(&self, model: &ModelConfig) -> docchat_telemetry::Result<()> {
        let Some(tracker) = self.tracker() else {
            return Ok(());
        };
        tracker
            .log_params(&[
                ("model", model.model_name.clone()),
                ("temperature", model.temperature.to_string()),
            ])
            .await
    }

    async fn log_summary(&self, report: &EvalReport) {
        let Some(tracker) = self.tracker() else {
            return;
        };
        let answered = report.records().iter().filter(|r| r.succeeded()).count();
        let failed = report.records().len() - answered;
        self.best_effort("log answered", tracker.log_metric("answered", answered as f64).await);
        self.best_effort("log failed", tracker.log_metric("failed", failed as f64).await);
    }

    async fn close_run(&self, report: &EvalReport) {
        let Some(tracker) = self.tracker() else {
            return;
        };
        let status = if report.records().iter().all(RunRecord::succeeded) {
            RunStatus::Finished
        } else {
            RunStatus::Failed
        };
        self.best_effort("end run", tracker.end_run(status).await);
    }

    fn best_effort(&self, action: &str, result: docchat_telemetry::Result<()>) {
        if let Err(e) = result {
            let tracker = self.tracker.as_ref().map(|t| t.name().to_string()).unwrap_or_default();
            warn!(%tracker, action, error = %e, "experiment tracking call failed");
        }
    }
}
