//! OpenAI client implementation.

use async_openai::{
    Client,
    config::OpenAIConfig as AsyncOpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use tracing::{debug, error};

use super::config::OpenAIConfig;
use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use crate::llm::Llm;

const PROVIDER: &str = "OpenAI";

/// OpenAI client for the standard OpenAI API and OpenAI-compatible APIs.
///
/// The model and temperature come from the [`ModelConfig`] passed to each
/// call, not from the client.
pub struct OpenAIClient {
    client: Client<AsyncOpenAIConfig>,
}

impl OpenAIClient {
    /// Create a new OpenAI client.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(ModelError::InvalidConfig("API key must not be empty".into()));
        }

        let mut openai_config = AsyncOpenAIConfig::new().with_api_key(&config.api_key);

        if let Some(org_id) = &config.organization_id {
            openai_config = openai_config.with_org_id(org_id);
        }

        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Ok(Self { client: Client::with_config(openai_config) })
    }

    fn map_err(e: OpenAIError) -> ModelError {
        match e {
            OpenAIError::ApiError(api) => {
                ModelError::Api { provider: PROVIDER.into(), message: api.message }
            }
            OpenAIError::InvalidArgument(message) => ModelError::InvalidConfig(message),
            other => ModelError::Transport { provider: PROVIDER.into(), message: other.to_string() },
        }
    }
}

#[async_trait]
impl Llm for OpenAIClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str, config: &ModelConfig) -> Result<String> {
        config.validate()?;

        debug!(
            provider = PROVIDER,
            model = %config.model_name,
            temperature = config.temperature,
            prompt_len = prompt.len(),
            "requesting completion"
        );

        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(Self::map_err)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&config.model_name)
            .temperature(config.temperature)
            .messages(vec![ChatCompletionRequestMessage::User(message)])
            .build()
            .map_err(Self::map_err)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "completion request failed");
            Self::map_err(e)
        })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ModelError::EmptyResponse { provider: PROVIDER.into() })
    }
}
