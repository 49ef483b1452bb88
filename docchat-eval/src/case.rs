//! Evaluation questions and their reference answers.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

/// One question, optionally with the answer a good response should match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalCase {
    pub question: String,
    #[serde(default, rename = "ground_truth", alias = "expected_answer")]
    pub expected_answer: Option<String>,
}

impl EvalCase {
    pub fn new(question: impl Into<String>) -> Self {
        Self { question: question.into(), expected_answer: None }
    }

    pub fn with_expected_answer(mut self, answer: impl Into<String>) -> Self {
        self.expected_answer = Some(answer.into());
        self
    }
}

/// An ordered list of [`EvalCase`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvalSet {
    cases: Vec<EvalCase>,
}

impl EvalSet {
    /// Build a set, rejecting empty sets and blank questions.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::InvalidSet`].
    pub fn new(cases: Vec<EvalCase>) -> Result<Self> {
        if cases.is_empty() {
            return Err(EvalError::InvalidSet("no cases".into()));
        }
        if let Some(index) = cases.iter().position(|c| c.question.trim().is_empty()) {
            return Err(EvalError::InvalidSet(format!("case {index} has an empty question")));
        }
        Ok(Self { cases })
    }

    /// The questions asked about the PrimMod workshop paper in a plain
    /// evaluation run. The first two carry reference answers.
    pub fn default_evaluation() -> Self {
        Self {
            cases: vec![
                EvalCase::new("What is the main topic of the PrimMod paper?").with_expected_answer(
                    "The PrimMod paper discusses a primitive-based modeling approach for AI \
                     workshop paper constraints and automation.",
                ),
                EvalCase::new("How does PrimMod handle AI workshop paper constraints?")
                    .with_expected_answer(
                        "PrimMod uses a modular approach to decompose constraints into manageable \
                         primitives and then reconstructs them for final verification.",
                    ),
                EvalCase::new("What are the key results mentioned in the documents?"),
            ],
        }
    }

    /// The questions used to compare generation configurations.
    pub fn ab_questions() -> Self {
        Self {
            cases: vec![
                EvalCase::new("What is PrimMod?"),
                EvalCase::new("What are the benefits of using primitives in modeling?"),
            ],
        }
    }

    /// Load a JSON array of `{"question": ..., "ground_truth": ...}` objects.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds an
    /// invalid set.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let cases: Vec<EvalCase> = serde_json::from_str(&content)?;
        Self::new(cases)
    }

    pub fn cases(&self) -> &[EvalCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_sets() {
        let eval = EvalSet::default_evaluation();
        assert_eq!(eval.len(), 3);
        assert_eq!(eval.cases().iter().filter(|c| c.expected_answer.is_some()).count(), 2);
        assert_eq!(EvalSet::ab_questions().cases()[0].question, "What is PrimMod?");
    }

    #[test]
    fn loads_ground_truth_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"question": "q1", "ground_truth": "a1"}}, {{"question": "q2"}}, {{"question": "q3", "expected_answer": "a3"}}]"#
        )
        .unwrap();

        let set = EvalSet::from_json_file(file.path()).unwrap();
        assert_eq!(set.cases()[0].expected_answer.as_deref(), Some("a1"));
        assert_eq!(set.cases()[1].expected_answer, None);
        assert_eq!(set.cases()[2].expected_answer.as_deref(), Some("a3"));
    }

    #[test]
    fn rejects_empty_and_blank() {
        assert!(matches!(EvalSet::new(vec![]), Err(EvalError::InvalidSet(_))));
        assert!(matches!(EvalSet::new(vec![EvalCase::new("  ")]), Err(EvalError::InvalidSet(_))));
    }
}
