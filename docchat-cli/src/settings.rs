//! Runtime settings read from the environment (and `.env`).

use anyhow::{Context, Result};
use docchat_model::{DEFAULT_MODEL, DEFAULT_TEMPERATURE, ModelConfig};
use docchat_telemetry::DEFAULT_LANGSMITH_ENDPOINT;

use crate::cli::GlobalArgs;

pub const DEFAULT_COLLECTION: &str = "primmod_paper";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_MLFLOW_URI: &str = "http://localhost:5000";
pub const DEFAULT_EXPERIMENT: &str = "LLMops_Multi_Doc_Chat";
pub const DEFAULT_LANGSMITH_PROJECT: &str = "docchat";

/// Everything the front end needs to wire the pipelines.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    /// OpenAI-compatible server used for both chat and embeddings.
    pub openai_base_url: Option<String>,
    pub model: ModelConfig,
    pub collection: String,
    pub qdrant_url: String,
    pub langsmith_api_key: Option<String>,
    pub langsmith_endpoint: String,
    pub langsmith_project: String,
    pub mlflow_tracking_uri: String,
    pub mlflow_experiment: String,
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let temperature = match get("DOCCHAT_TEMPERATURE") {
            Some(raw) => raw
                .trim()
                .parse::<f32>()
                .with_context(|| format!("DOCCHAT_TEMPERATURE is not a number: {raw}"))?,
            None => DEFAULT_TEMPERATURE,
        };

        Ok(Self {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL"),
            model: ModelConfig::new(
                get("DOCCHAT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                temperature,
            ),
            collection: get("DOCCHAT_COLLECTION").unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            qdrant_url: get("QDRANT_URL").unwrap_or_else(|| DEFAULT_QDRANT_URL.to_string()),
            langsmith_api_key: get("LANGSMITH_API_KEY"),
            langsmith_endpoint: get("LANGSMITH_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_LANGSMITH_ENDPOINT.to_string()),
            langsmith_project: get("LANGSMITH_PROJECT")
                .unwrap_or_else(|| DEFAULT_LANGSMITH_PROJECT.to_string()),
            mlflow_tracking_uri: get("MLFLOW_TRACKING_URI")
                .unwrap_or_else(|| DEFAULT_MLFLOW_URI.to_string()),
            mlflow_experiment: get("MLFLOW_EXPERIMENT")
                .unwrap_or_else(|| DEFAULT_EXPERIMENT.to_string()),
        })
    }

    /// Apply command-line overrides on top of the environment.
    pub fn with_overrides(mut self, args: &GlobalArgs) -> Result<Self> {
        if let Some(collection) = &args.collection {
            self.collection = collection.clone();
        }
        if let Some(model) = &args.model {
            self.model.model_name = model.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model = self.model.with_temperature(temperature);
        }
        if let Some(url) = &args.qdrant_url {
            self.qdrant_url = url.clone();
        }
        self.model.validate().context("invalid model settings")?;
        Ok(self)
    }

    /// The OpenAI key, or an error naming the variable to set.
    pub fn require_openai_key(&self) -> Result<&str> {
        self.openai_api_key.as_deref().context("OPENAI_API_KEY is not set")
    }

    /// Tracing is requested whenever a LangSmith key is present.
    pub fn tracing_requested(&self) -> bool {
        self.langsmith_api_key.is_some()
    }
}
