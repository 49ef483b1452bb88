//! Per-question run records and the metrics computed for them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use docchat_model::ModelConfig;
use serde::{Deserialize, Serialize};

/// Length of the answer in characters.
pub const ANSWER_CHARS: &str = "answer_chars";
/// Number of distinct source documents behind the answer.
pub const SOURCE_COUNT: &str = "source_count";
/// Number of chunks placed in the prompt.
pub const CONTEXT_COUNT: &str = "context_count";
/// Share of reference-answer tokens found in the answer.
pub const TOKEN_RECALL: &str = "token_recall";

/// The outcome of asking one question under one configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Tracking run the record belongs to.
    pub run_name: String,
    /// Configuration label, e.g. `GPT-4o-Mini-Low-Temp`.
    pub config_name: String,
    pub model: String,
    pub temperature: f32,
    pub question: String,
    pub answer: Option<String>,
    pub error: Option<String>,
    pub sources: Vec<String>,
    pub retrieved_contexts: Vec<String>,
    pub expected_answer: Option<String>,
    pub metrics: BTreeMap<String, f64>,
    pub recorded_at: DateTime<Utc>,
}

/// What the answering side produced for one question.
#[derive(Debug, Clone, Default)]
pub(crate) struct Observation {
    pub answer: Option<String>,
    pub error: Option<String>,
    pub sources: Vec<String>,
    pub contexts: Vec<String>,
}

impl RunRecord {
    pub(crate) fn new(
        run_name: &str,
        config_name: &str,
        config: &ModelConfig,
        question: &str,
        expected_answer: Option<&str>,
        observed: Observation,
    ) -> Self {
        let metrics = match &observed.answer {
            Some(answer) => answer_metrics(
                answer,
                observed.sources.len(),
                observed.contexts.len(),
                expected_answer,
            ),
            None => BTreeMap::new(),
        };
        Self {
            run_name: run_name.to_string(),
            config_name: config_name.to_string(),
            model: config.model_name.clone(),
            temperature: config.temperature,
            question: question.to_string(),
            answer: observed.answer,
            error: observed.error,
            sources: observed.sources,
            retrieved_contexts: observed.contexts,
            expected_answer: expected_answer.map(str::to_string),
            metrics,
            recorded_at: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.answer.is_some()
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

fn answer_metrics(
    answer: &str,
    source_count: usize,
    context_count: usize,
    expected: Option<&str>,
) -> BTreeMap<String, f64> {
    let mut metrics = BTreeMap::new();
    metrics.insert(ANSWER_CHARS.to_string(), answer.chars().count() as f64);
    metrics.insert(SOURCE_COUNT.to_string(), source_count as f64);
    metrics.insert(CONTEXT_COUNT.to_string(), context_count as f64);
    if let Some(recall) = expected.and_then(|expected| token_recall(answer, expected)) {
        metrics.insert(TOKEN_RECALL.to_string(), recall);
    }
    metrics
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of the distinct lowercase tokens of `expected` that also occur in
/// `answer`. `None` when `expected` has no tokens.
pub fn token_recall(answer: &str, expected: &str) -> Option<f64> {
    let expected = tokens(expected);
    if expected.is_empty() {
        return None;
    }
    let answer = tokens(answer);
    let hits = expected.iter().filter(|t| answer.contains(*t)).count();
    Some(hits as f64 / expected.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recall_counts_distinct_tokens_case_insensitively() {
        assert_eq!(token_recall("PrimMod uses primitives.", "primmod uses modular primitives"), Some(0.75));
        assert_eq!(token_recall("anything", "..."), None);
        assert_eq!(token_recall("", "a a b"), Some(0.0));
    }

    #[test]
    fn failed_record_has_no_metrics() {
        let record = RunRecord::new(
            "run",
            "default",
            &ModelConfig::default(),
            "q",
            Some("a"),
            Observation { error: Some("boom".into()), ..Default::default() },
        );
        assert!(!record.succeeded());
        assert!(record.metrics.is_empty());
        assert_eq!(record.expected_answer.as_deref(), Some("a"));
    }

    #[test]
    fn answered_record_metrics() {
        let record = RunRecord::new(
            "run",
            "default",
            &ModelConfig::default(),
            "q",
            None,
            Observation {
                answer: Some("héllo".into()),
                sources: vec!["a.pdf".into()],
                contexts: vec!["c1".into(), "c2".into()],
                ..Default::default()
            },
        );
        assert_eq!(record.metric(ANSWER_CHARS), Some(5.0));
        assert_eq!(record.metric(SOURCE_COUNT), Some(1.0));
        assert_eq!(record.metric(CONTEXT_COUNT), Some(2.0));
        assert_eq!(record.metric(TOKEN_RECALL), None);
        assert_eq!(record.model, "gpt-4o-mini");
    }
}
