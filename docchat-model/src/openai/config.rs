use crate::error::{ModelError, Result};

/// Connection settings for an OpenAI or OpenAI-compatible endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAIConfig {
    /// Secret API key.
    pub api_key: String,
    /// Optional organization id.
    pub organization_id: Option<String>,
    /// Optional base URL for OpenAI-compatible servers.
    pub base_url: Option<String>,
}

impl OpenAIConfig {
    /// Config for the public OpenAI API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), organization_id: None, base_url: None }
    }

    /// Config for an OpenAI-compatible API at `base_url`.
    pub fn compatible(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), organization_id: None, base_url: Some(base_url.into()) }
    }

    /// Read the key from `OPENAI_API_KEY` and the optional base URL from `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                ModelError::InvalidConfig("OPENAI_API_KEY environment variable not set".into())
            })?;
        let base_url = std::env::var("OPENAI_BASE_URL").ok().filter(|url| !url.is_empty());
        Ok(Self { api_key, organization_id: None, base_url })
    }

    /// Set the organization id.
    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }
}
