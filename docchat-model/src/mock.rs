//! Scripted [`Llm`] for tests and offline runs.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use crate::llm::Llm;

type Responder = Arc<dyn Fn(&str, &ModelConfig) -> String + Send + Sync>;

enum Behaviour {
    Fixed(String),
    Respond(Responder),
    Fail(String),
}

/// One recorded call to [`MockLlm::generate`](Llm::generate).
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    /// The prompt exactly as received.
    pub prompt: String,
    /// The configuration the caller asked for.
    pub config: ModelConfig,
}

/// A deterministic [`Llm`] that never touches the network.
///
/// Every call is recorded, so tests can assert on the rendered prompt and the
/// configuration that reached the generator.
///
/// # Example
///
/// ```rust
/// use docchat_model::MockLlm;
///
/// let llm = MockLlm::new("42");
/// assert!(llm.calls().is_empty());
/// ```
pub struct MockLlm {
    behaviour: Behaviour,
    calls: Mutex<Vec<MockCall>>,
}

impl MockLlm {
    /// Always answer with `response`.
    pub fn new(response: impl Into<String>) -> Self {
        Self::with_behaviour(Behaviour::Fixed(response.into()))
    }

    /// Answer with whatever `responder` returns for the prompt and config.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str, &ModelConfig) -> String + Send + Sync + 'static,
    {
        Self::with_behaviour(Behaviour::Respond(Arc::new(responder)))
    }

    /// Fail every call with a transport error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behaviour(Behaviour::Fail(message.into()))
    }

    fn with_behaviour(behaviour: Behaviour) -> Self {
        Self { behaviour, calls: Mutex::new(Vec::new()) }
    }

    /// All calls received so far, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    /// The prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.prompt).collect()
    }
}

#[async_trait]
impl Llm for MockLlm {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, prompt: &str, config: &ModelConfig) -> Result<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(MockCall { prompt: prompt.to_string(), config: config.clone() });

        match &self.behaviour {
            Behaviour::Fixed(response) => Ok(response.clone()),
            Behaviour::Respond(responder) => Ok(responder(prompt, config)),
            Behaviour::Fail(message) => {
                Err(ModelError::Transport { provider: "mock".to_string(), message: message.clone() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_response_is_returned_and_recorded() {
        let llm = MockLlm::new("hello");
        let config = ModelConfig::new("gpt-4o-mini", 0.3);

        let text = llm.generate("prompt one", &config).await.unwrap();

        assert_eq!(text, "hello");
        assert_eq!(llm.calls(), vec![MockCall { prompt: "prompt one".into(), config }]);
    }

    #[tokio::test]
    async fn responder_sees_prompt_and_config() {
        let llm = MockLlm::with_responder(|prompt, config| {
            format!("{}@{}:{}", prompt.len(), config.model_name, config.temperature)
        });

        let text = llm.generate("abcd", &ModelConfig::new("m", 0.9)).await.unwrap();

        assert_eq!(text, "4@m:0.9");
    }

    #[tokio::test]
    async fn failing_mock_returns_transport_error_with_message() {
        let llm = MockLlm::failing("connection reset by peer");

        let err = llm.generate("prompt", &ModelConfig::default()).await.unwrap_err();

        assert!(matches!(err, ModelError::Transport { .. }));
        assert!(err.to_string().contains("connection reset by peer"));
        assert_eq!(llm.prompts(), vec!["prompt".to_string()]);
    }
}
