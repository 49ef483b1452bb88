//! Collected run records and their CSV/JSON serializations.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::record::{ANSWER_CHARS, CONTEXT_COUNT, RunRecord, SOURCE_COUNT, TOKEN_RECALL};

/// Separator between contexts in the flat CSV column.
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

/// The records of one evaluation or A/B run, in ask order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    records: Vec<RunRecord>,
}

/// One row of the answer-quality dataset: what a scorer needs to grade an
/// answer against its retrieved contexts and reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySample {
    pub question: String,
    pub answer: String,
    pub contexts: Vec<String>,
    pub ground_truth: Option<String>,
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    run_name: &'a str,
    config_name: &'a str,
    model: &'a str,
    temperature: f32,
    question: &'a str,
    answer: Option<&'a str>,
    error: Option<&'a str>,
    sources: String,
    contexts: String,
    ground_truth: Option<&'a str>,
    answer_chars: Option<f64>,
    source_count: Option<f64>,
    context_count: Option<f64>,
    token_recall: Option<f64>,
    recorded_at: String,
}

impl<'a> From<&'a RunRecord> for CsvRow<'a> {
    fn from(record: &'a RunRecord) -> Self {
        Self {
            run_name: &record.run_name,
            config_name: &record.config_name,
            model: &record.model,
            temperature: record.temperature,
            question: &record.question,
            answer: record.answer.as_deref(),
            error: record.error.as_deref(),
            sources: record.sources.join(";"),
            contexts: record.retrieved_contexts.join(CONTEXT_SEPARATOR),
            ground_truth: record.expected_answer.as_deref(),
            answer_chars: record.metric(ANSWER_CHARS),
            source_count: record.metric(SOURCE_COUNT),
            context_count: record.metric(CONTEXT_COUNT),
            token_recall: record.metric(TOKEN_RECALL),
            recorded_at: record.recorded_at.to_rfc3339(),
        }
    }
}

impl EvalReport {
    pub fn new(records: Vec<RunRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<RunRecord> {
        self.records
    }

    /// Records grouped by configuration name.
    pub fn by_config(&self) -> BTreeMap<&str, Vec<&RunRecord>> {
        let mut groups: BTreeMap<&str, Vec<&RunRecord>> = BTreeMap::new();
        for record in &self.records {
            groups.entry(record.config_name.as_str()).or_default().push(record);
        }
        groups
    }

    /// Mean of `metric` over the records of `config_name` that carry it.
    pub fn mean_metric(&self, config_name: &str, metric: &str) -> Option<f64> {
        let values: Vec<f64> = self
            .records
            .iter()
            .filter(|r| r.config_name == config_name)
            .filter_map(|r| r.metric(metric))
            .collect();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Answered records as scorer input. Failed questions are left out.
    pub fn quality_dataset(&self) -> Vec<QualitySample> {
        self.records
            .iter()
            .filter_map(|r| {
                Some(QualitySample {
                    question: r.question.clone(),
                    answer: r.answer.clone()?,
                    contexts: r.retrieved_contexts.clone(),
                    ground_truth: r.expected_answer.clone(),
                })
            })
            .collect()
    }

    /// Write one CSV row per record. Contexts are joined with
    /// [`CONTEXT_SEPARATOR`], sources with `;`; metrics a record lacks are
    /// left empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.records {
            writer.serialize(CsvRow::from(record))?;
        }
        writer.flush()?;
        info!(path = %path.display(), rows = self.records.len(), "wrote evaluation csv");
        Ok(())
    }

    /// Write the records as a pretty-printed JSON array.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.records)?;
        info!(path = %path.display(), records = self.records.len(), "wrote evaluation json");
        Ok(())
    }
}
