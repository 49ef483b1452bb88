//! The generator trait.

use async_trait::async_trait;

use crate::config::ModelConfig;
use crate::error::Result;

/// A text-completion backend.
///
/// Implementations receive a fully rendered prompt and return the raw
/// completion text. Prompt construction, retrieval and source handling all
/// happen upstream.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_model::{Llm, ModelConfig};
///
/// let text = llm.generate(&prompt, &ModelConfig::new("gpt-4o-mini", 0.1)).await?;
/// ```
#[async_trait]
pub trait Llm: Send + Sync {
    /// A short identifier for logs, e.g. `openai`.
    fn name(&self) -> &str;

    /// Complete `prompt` with the given model configuration.
    async fn generate(&self, prompt: &str, config: &ModelConfig) -> Result<String>;
}
