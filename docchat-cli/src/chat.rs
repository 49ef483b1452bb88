//! Interactive question loop.

use anyhow::Result;
use docchat_rag::{AnswerOutcome, AnsweringPipeline};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

pub const BANNER: &str = "=== Multi-Document PDF Chat (OpenAI) ===";
pub const PROMPT: &str = "You: ";

/// `exit`, `quit` or `q`, in any case.
pub fn is_exit(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "exit" | "quit" | "q")
}

/// Console rendering of one answer.
pub fn render(outcome: &AnswerOutcome) -> String {
    match outcome {
        AnswerOutcome::Answered { answer, sources } => {
            format!("AI: {answer}\n\nSources used: {sources:?}")
        }
        AnswerOutcome::Failed { error } => format!("Error: {error}\n"),
    }
}

/// Whether a question made it into the line history. History is a
/// convenience, so a failure is logged and the loop carries on.
fn recorded(result: rustyline::Result<bool>) -> bool {
    match result {
        Ok(added) => added,
        Err(e) => {
            debug!(error = %e, "failed to record history entry");
            false
        }
    }
}

/// Read questions until the user exits or closes stdin.
pub async fn run_chat(pipeline: &AnsweringPipeline) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("\n{BANNER}\n");

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                println!("Goodbye!");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit(question) {
            println!("Goodbye!");
            return Ok(());
        }
        recorded(editor.add_history_entry(question));

        println!("Thinking...");
        let outcome = pipeline.answer(question).await;
        println!("{}", render(&outcome));
    }
}
