//! # docchat-model
//!
//! The generation seam for DocChat.
//!
//! ## Overview
//!
//! This crate does not generate text itself. It defines the [`Llm`] trait the
//! answering pipeline talks to and ships two implementations:
//!
//! - [`OpenAIClient`] - OpenAI chat completions (GPT-4o, GPT-4o-mini, etc.)
//! - [`MockLlm`] - scripted responses and failures for tests
//!
//! Every call carries a [`ModelConfig`] (model name and temperature), so one
//! client can serve several generator configurations side by side, which is
//! what the A/B evaluation runner relies on.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use docchat_model::{Llm, ModelConfig};
//! use docchat_model::openai::{OpenAIClient, OpenAIConfig};
//!
//! let llm = OpenAIClient::new(OpenAIConfig::from_env()?)?;
//! let answer = llm.generate("Say hello.", &ModelConfig::default()).await?;
//! ```
//!
//! ## Supported Models
//!
//! | Model | Description |
//! |-------|-------------|
//! | `gpt-4o-mini` | Fast, cost-effective (default) |
//! | `gpt-4o` | Most capable model |
//! | any OpenAI-compatible name | via [`OpenAIConfig::compatible`](openai::OpenAIConfig::compatible) |

mod config;
mod error;
mod llm;
pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;

pub use config::{DEFAULT_MODEL, DEFAULT_TEMPERATURE, ModelConfig};
pub use error::{ModelError, Result};
pub use llm::Llm;
pub use mock::MockLlm;
#[cfg(feature = "openai")]
pub use openai::OpenAIClient;
