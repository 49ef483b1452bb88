//! # docchat-cli
//!
//! The `docchat` command: ingest a document into a collection, ask
//! questions about it once or in an interactive loop, and run the
//! evaluation and A/B harnesses.
//!
//! ```text
//! docchat ingest paper.pdf
//! docchat ask "What is PrimMod?"
//! docchat chat
//! docchat eval --output-dir results
//! docchat --store memory --embedder hash --ingest notes.md ab-test
//! ```
//!
//! Settings come from the environment (and `.env`), see [`Settings`];
//! command-line flags take precedence.

pub mod app;
pub mod chat;
pub mod cli;
pub mod settings;

pub use app::{App, run, run_with};
pub use cli::{Cli, Command, GlobalArgs};
pub use settings::Settings;
