//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// The PDF ingested when `docchat ingest` is given no path.
pub const DEFAULT_PDF_PATH: &str = "data/Final Version PrimMod4AI___workshop _Paper.pdf";

/// Ask questions about your PDFs.
#[derive(Parser, Debug)]
#[command(name = "docchat", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand. Unset options fall back to the
/// environment.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Vector collection to read and write
    #[arg(long, global = true)]
    pub collection: Option<String>,

    /// Chat model name
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Sampling temperature (0.0 - 2.0)
    #[arg(long, global = true)]
    pub temperature: Option<f32>,

    /// Embedding provider
    #[arg(long, value_enum, default_value_t = EmbedderKind::Openai, global = true)]
    pub embedder: EmbedderKind,

    /// Vector store backend
    #[arg(long, value_enum, default_value_t = StoreKind::Qdrant, global = true)]
    pub store: StoreKind,

    /// Qdrant gRPC url
    #[arg(long, global = true)]
    pub qdrant_url: Option<String>,

    /// Ingest this document before running the command
    #[arg(long, global = true)]
    pub ingest: Option<PathBuf>,

    /// Write captured spans as JSON to this file on exit
    #[arg(long, global = true)]
    pub trace_file: Option<PathBuf>,

    /// Skip the MLflow probe and run without experiment tracking
    #[arg(long, global = true)]
    pub no_tracking: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmbedderKind {
    /// OpenAI embeddings API
    #[default]
    Openai,
    /// Offline feature hashing
    Hash,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoreKind {
    /// Process-local store, lost on exit
    Memory,
    /// Qdrant server
    #[default]
    Qdrant,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Load a document and replace the collection with its chunks
    Ingest {
        /// PDF, text or markdown file
        #[arg(default_value = DEFAULT_PDF_PATH)]
        path: PathBuf,
    },
    /// Answer one question and print the JSON outcome
    Ask {
        question: String,
    },
    /// Interactive question loop
    Chat,
    /// Run the evaluation questions and write CSV and JSON results
    Eval {
        /// JSON file of `{"question", "ground_truth"}` objects
        #[arg(long)]
        cases: Option<PathBuf>,
        /// Tracking run name
        #[arg(long, default_value = docchat_eval::DEFAULT_EVALUATION_RUN)]
        run_name: String,
        /// Directory for evaluation_results.csv and evaluation_results.json
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Compare low and high temperature answers
    AbTest {
        /// JSON file of `{"question", "ground_truth"}` objects
        #[arg(long)]
        cases: Option<PathBuf>,
        /// Directory for ab_test_results.csv and ab_test_results.json
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_defaults_to_workshop_paper() {
        let cli = Cli::try_parse_from(["docchat", "ingest"]).unwrap();
        assert_eq!(cli.command, Command::Ingest { path: PathBuf::from(DEFAULT_PDF_PATH) });
        assert_eq!(cli.global.store, StoreKind::Qdrant);
        assert_eq!(cli.global.embedder, EmbedderKind::Openai);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "docchat",
            "ask",
            "What is PrimMod?",
            "--store",
            "memory",
            "--embedder",
            "hash",
            "--ingest",
            "paper.pdf",
        ])
        .unwrap();
        assert_eq!(cli.command, Command::Ask { question: "What is PrimMod?".into() });
        assert_eq!(cli.global.store, StoreKind::Memory);
        assert_eq!(cli.global.embedder, EmbedderKind::Hash);
        assert_eq!(cli.global.ingest, Some(PathBuf::from("paper.pdf")));
    }

    #[test]
    fn eval_defaults() {
        let cli = Cli::try_parse_from(["docchat", "eval"]).unwrap();
        match cli.command {
            Command::Eval { cases, run_name, output_dir } => {
                assert_eq!(cases, None);
                assert_eq!(run_name, "Initial RAG Evaluation");
                assert_eq!(output_dir, PathBuf::from("."));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn ab_test_subcommand_name() {
        let cli = Cli::try_parse_from(["docchat", "ab-test", "--output-dir", "out"]).unwrap();
        assert!(matches!(cli.command, Command::AbTest { .. }));
        assert!(Cli::try_parse_from(["docchat", "--store", "sqlite", "chat"]).is_err());
        assert!(Cli::try_parse_from(["docchat"]).is_err());
    }
}
