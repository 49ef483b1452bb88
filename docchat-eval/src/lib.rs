//! # docchat-eval
//!
//! Evaluation harness for the DocChat answering pipeline.
//!
//! An [`EvalRunner`] asks every question of an [`EvalSet`] and records the
//! answer, the retrieved contexts and a few cheap metrics in a
//! [`RunRecord`]. Two kinds of runs are supported:
//!
//! - [`EvalRunner::run_evaluation`] goes through the full pipeline, tracing
//!   and tracking included, under one named tracking run.
//! - [`EvalRunner::run_ab_test`] answers the same questions under several
//!   [`AbConfig`]s, one tracking run per configuration.
//!
//! The resulting [`EvalReport`] can be written as CSV or JSON, or turned into
//! a dataset for an external answer-quality scorer.
//!
//! ```rust,ignore
//! use docchat_eval::{AbConfig, EvalRunner, EvalSet};
//!
//! let runner = EvalRunner::new(pipeline).with_tracker(tracker);
//! let report = runner.run_ab_test(&AbConfig::defaults(), &EvalSet::ab_questions()).await;
//! report.write_csv("ab_results.csv")?;
//! ```

pub mod case;
pub mod error;
pub mod record;
pub mod report;
pub mod runner;

pub use case::{EvalCase, EvalSet};
pub use error::{EvalError, Result};
pub use record::{RunRecord, token_recall};
pub use report::{EvalReport, QualitySample};
pub use runner::{AbConfig, DEFAULT_EVALUATION_RUN, EvalRunner, answer_artifact_name};
