//! OpenAI chat-completion backend.
//!
//! Only available when the `openai` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use docchat_model::openai::{OpenAIClient, OpenAIConfig};
//!
//! let client = OpenAIClient::new(OpenAIConfig::new(std::env::var("OPENAI_API_KEY")?))?;
//!
//! // Any OpenAI-compatible server (vLLM, Ollama, ...)
//! let local = OpenAIClient::new(OpenAIConfig::compatible("unused", "http://localhost:11434/v1"))?;
//! ```

mod client;
mod config;

pub use client::OpenAIClient;
pub use config::OpenAIConfig;
