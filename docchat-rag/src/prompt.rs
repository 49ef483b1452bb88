//! Prompt assembly.

use crate::document::SearchResult;
use crate::error::{RagError, Result};

const CONTEXT: &str = "{context}";
const QUESTION: &str = "{question}";

/// The answering template.
pub const RESEARCH_ASSISTANT_TEMPLATE: &str = "\
You are a knowledgeable research assistant. Answer the user's question based on the provided context.
Try to be comprehensive and structured in your answer.
If the information is not present in the context, explicitly state what is missing or if you can't find it.

Context:
{context}

Question: {question}

Answer:
";

/// The short template used for generator comparisons.
pub const CONCISE_TEMPLATE: &str = "Answer based on context:\n{context}\n\nQuestion: {question}";

/// A prompt with `{context}` and `{question}` placeholders.
///
/// Rendering is a single pass, so placeholder-like text inside the context
/// or the question is left alone. No length budgeting is done: an oversized
/// context is the generator's problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::research_assistant()
    }
}

impl PromptTemplate {
    /// # Errors
    ///
    /// Returns [`RagError::Config`] unless `template` contains both
    /// `{context}` and `{question}`.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in [CONTEXT, QUESTION] {
            if !template.contains(placeholder) {
                return Err(RagError::Config(format!("prompt template is missing {placeholder}")));
            }
        }
        Ok(Self { template })
    }

    pub fn research_assistant() -> Self {
        Self { template: RESEARCH_ASSISTANT_TEMPLATE.to_string() }
    }

    pub fn concise() -> Self {
        Self { template: CONCISE_TEMPLATE.to_string() }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Join chunk texts with blank lines and render them with `question`.
    pub fn assemble(&self, chunks: &[SearchResult], question: &str) -> String {
        self.render(&join_context(chunks), question)
    }

    pub fn render(&self, context: &str, question: &str) -> String {
        let mut out = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();
        loop {
            let next = [(CONTEXT, context), (QUESTION, question)]
                .into_iter()
                .filter_map(|(placeholder, value)| rest.find(placeholder).map(|at| (at, placeholder, value)))
                .min_by_key(|(at, _, _)| *at);
            match next {
                Some((at, placeholder, value)) => {
                    out.push_str(&rest[..at]);
                    out.push_str(value);
                    rest = &rest[at + placeholder.len()..];
                }
                None => {
                    out.push_str(rest);
                    return out;
                }
            }
        }
    }
}

/// Chunk texts in rank order, separated by a blank line.
pub fn join_context(chunks: &[SearchResult]) -> String {
    chunks.iter().map(|r| r.chunk.text.as_str()).collect::<Vec<_>>().join("\n\n")
}
