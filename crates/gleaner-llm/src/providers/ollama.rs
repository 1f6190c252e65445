//! Ollama local LLM provider implementation.

use super::common::{build_http_client, ensure_success};
use crate::error::{LlmError, Result};
use crate::provider::{CompletionRequest, CompletionResponse, LlmProvider, Role, Usage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Ollama local LLM provider.
///
/// Connects to a local Ollama instance; nothing leaves the machine.
pub struct OllamaProvider {
    model: String,
    client: Client,
    base_url: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider with default settings.
    pub fn new() -> Result<Self> {
        Self::with_model("llama3.1:8b")
    }

    /// Create a new Ollama provider with a specific model.
    pub fn with_model(model: impl Into<String>) -> Result<Self> {
        Self::with_url("http://localhost:11434", model, None)
    }

    /// Create a new Ollama provider with custom URL, model and timeout.
    pub fn with_url(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: Option<u64>,
    ) -> Result<Self> {
        Ok(Self {
            model: model.into(),
            client: build_http_client(Some(timeout_secs.unwrap_or(120)))?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Convert internal request to Ollama API format.
    fn to_api_request(&self, request: &CompletionRequest) -> OllamaRequest {
        let mut prompt_parts = Vec::new();

        for message in &request.messages {
            let prefix = match message.role {
                Role::User => "User:",
                Role::Assistant => "Assistant:",
                Role::System => "System:",
            };
            prompt_parts.push(format!("{prefix} {}", message.content));
        }
        prompt_parts.push("Assistant:".to_string());

        OllamaRequest {
            model: self.model.clone(),
            prompt: prompt_parts.join("\n\n"),
            system: request.system_prompt.clone(),
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens.and_then(|t| i32::try_from(t).ok()),
                stop: if request.stop_sequences.is_empty() {
                    None
                } else {
                    Some(request.stop_sequences.clone())
                },
            },
        }
    }

    /// Convert Ollama API response to internal format.
    fn convert_api_response(response: OllamaResponse) -> Result<CompletionResponse> {
        if response.response.trim().is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: "ollama".to_string(),
            });
        }

        let usage = match (response.prompt_eval_count, response.eval_count) {
            (Some(input_tokens), Some(output_tokens)) => Some(Usage {
                input_tokens,
                output_tokens,
            }),
            _ => None,
        };

        Ok(CompletionResponse {
            content: response.response,
            model: response.model,
            stop_reason: response.done_reason,
            usage,
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let api_request = self.to_api_request(&request);
        tracing::debug!(model = %self.model, "Sending Ollama generate request");

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&api_request)
            .send()
            .await?;

        let response = ensure_success("ollama", response).await?;

        let api_response: OllamaResponse =
            response.json().await.map_err(|e| LlmError::ParseError {
                provider: "ollama".to_string(),
                message: format!("Failed to parse response: {e}"),
            })?;

        Self::convert_api_response(api_response)
    }

    fn provider_id(&self) -> &'static str {
        "ollama"
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Default, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    model: String,
    response: String,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}
