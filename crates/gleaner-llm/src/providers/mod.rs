//! LLM provider implementations.

pub mod common;
pub mod gemini;
pub mod ollama;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;

use crate::error::{LlmError, Result};
use crate::provider::LlmProvider;
use gleaner_core::LlmConfig;
use std::sync::Arc;

/// Build the provider named in configuration.
///
/// # Errors
/// Returns error for an unknown provider name, a hosted provider without
/// an API key, or an HTTP client that cannot be built.
pub fn provider_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    match config.provider.as_str() {
        "gemini" => {
            let api_key = config.api_key.clone().ok_or_else(|| LlmError::MissingApiKey {
                provider: "gemini".to_string(),
            })?;
            let provider = GeminiProvider::with_options(
                api_key,
                config.model.clone(),
                config.endpoint.clone(),
                Some(config.timeout_secs),
            )?;
            Ok(Arc::new(provider))
        }
        "ollama" => {
            let provider = OllamaProvider::with_url(
                config
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string()),
                config.model.clone(),
                Some(config.timeout_secs),
            )?;
            Ok(Arc::new(provider))
        }
        other => Err(LlmError::UnsupportedProvider(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_requires_key() {
        let config = LlmConfig::default();
        let result = provider_from_config(&config);
        assert!(matches!(result, Err(LlmError::MissingApiKey { .. })));

        let config = LlmConfig {
            api_key: Some("test-key".to_string()),
            ..LlmConfig::default()
        };
        let provider = provider_from_config(&config).expect("build gemini");
        assert_eq!(provider.provider_id(), "gemini");
    }

    #[test]
    fn test_ollama_from_config() {
        let config = LlmConfig {
            provider: "ollama".to_string(),
            model: "llama3.1:8b".to_string(),
            ..LlmConfig::default()
        };
        let provider = provider_from_config(&config).expect("build ollama");
        assert_eq!(provider.provider_id(), "ollama");
    }

    #[test]
    fn test_unknown_provider() {
        let config = LlmConfig {
            provider: "anthropic".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            provider_from_config(&config),
            Err(LlmError::UnsupportedProvider(_))
        ));
    }
}
