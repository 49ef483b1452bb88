//! Generator configuration.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Model used when nothing else is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Sampling temperature used when nothing else is configured.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// The `{model_name, temperature}` pair sent with every generation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Provider model identifier, e.g. `gpt-4o-mini`.
    pub model_name: String,
    /// Sampling temperature in `0.0..=2.0`.
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { model_name: DEFAULT_MODEL.to_string(), temperature: DEFAULT_TEMPERATURE }
    }
}

impl ModelConfig {
    /// Create a config for the given model and temperature.
    pub fn new(model_name: impl Into<String>, temperature: f32) -> Self {
        Self { model_name: model_name.into(), temperature }
    }

    /// Return a copy with a different temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Check that the config can be sent to a provider.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidConfig`] if the model name is blank or the
    /// temperature is outside `0.0..=2.0`.
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(ModelError::InvalidConfig("model_name must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ModelError::InvalidConfig(format!(
                "temperature ({}) must be between 0.0 and 2.0",
                self.temperature
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_gpt_4o_mini_at_low_temperature() {
        let config = ModelConfig::default();
        assert_eq!(config.model_name, "gpt-4o-mini");
        assert_eq!(config.temperature, 0.1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let err = ModelConfig::new("gpt-4o-mini", 2.5).validate().unwrap_err();
        assert!(matches!(err, ModelError::InvalidConfig(_)));
        assert!(ModelConfig::new("gpt-4o-mini", -0.1).validate().is_err());
    }

    #[test]
    fn rejects_blank_model_name() {
        assert!(ModelConfig::new("  ", 0.5).validate().is_err());
    }

    #[test]
    fn with_temperature_keeps_model() {
        let config = ModelConfig::default().with_temperature(0.9);
        assert_eq!(config.model_name, DEFAULT_MODEL);
        assert_eq!(config.temperature, 0.9);
    }

    #[test]
    fn reads_ab_config_json() {
        let config: ModelConfig =
            serde_json::from_str(r#"{"model_name": "gpt-4o-mini", "temperature": 0.9}"#).unwrap();
        assert_eq!(config, ModelConfig::new("gpt-4o-mini", 0.9));
    }
}
