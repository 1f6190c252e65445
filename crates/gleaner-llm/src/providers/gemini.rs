//! Google Gemini API provider implementation.

use super::common::{build_http_client, convert_role_gemini, ensure_success};
use crate::error::{LlmError, Result};
use crate::provider::{CompletionRequest, CompletionResponse, LlmProvider, Usage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini API provider.
///
/// Supports Gemini models via Google's `generateContent` API.
/// Note: Gemini uses "user"/"model" roles instead of "user"/"assistant".
pub struct GeminiProvider {
    api_key: String,
    model: String,
    client: Client,
    base_url: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_model(api_key, "gemini-2.0-flash")
    }

    /// Create a new Gemini provider with a specific model.
    pub fn with_model(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::with_options(api_key, model, None, None)
    }

    /// Create a provider with an optional base URL override and request timeout.
    pub fn with_options(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: Option<String>,
        timeout_secs: Option<u64>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey {
                provider: "gemini".to_string(),
            });
        }

        Ok(Self {
            api_key,
            model: model.into(),
            client: build_http_client(timeout_secs)?,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Convert internal request to Gemini API format.
    #[allow(clippy::unused_self)]
    fn to_api_request(&self, request: &CompletionRequest) -> GeminiRequest {
        let system_instruction = request.system_prompt.as_ref().map(|prompt| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: Some(prompt.clone()),
            }],
        });

        let contents = request
            .messages
            .iter()
            .map(|message| GeminiContent {
                role: Some(convert_role_gemini(message.role).to_string()),
                parts: vec![GeminiPart {
                    text: Some(message.content.clone()),
                }],
            })
            .collect();

        GeminiRequest {
            contents,
            system_instruction,
            generation_config: Some(GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens.and_then(|t| i32::try_from(t).ok()),
                stop_sequences: if request.stop_sequences.is_empty() {
                    None
                } else {
                    Some(request.stop_sequences.clone())
                },
            }),
        }
    }

    /// Convert Gemini API response to internal format.
    fn convert_api_response(&self, response: GeminiResponse) -> Result<CompletionResponse> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::EmptyResponse {
                provider: "gemini".to_string(),
            })?;

        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: "gemini".to_string(),
            });
        }

        Ok(CompletionResponse {
            content: text,
            model: response
                .model_version
                .unwrap_or_else(|| self.model.clone()),
            stop_reason: candidate.finish_reason,
            usage: response.usage_metadata.map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            }),
        })
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let api_request = self.to_api_request(&request);
        tracing::debug!(
            model = %self.model,
            prompt_chars = request.prompt_chars(),
            "Sending Gemini generateContent request"
        );

        let response = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&api_request)
            .send()
            .await?;

        let response = ensure_success("gemini", response).await?;

        let api_response: GeminiResponse =
            response.json().await.map_err(|e| LlmError::ParseError {
                provider: "gemini".to_string(),
                message: format!("Failed to parse response: {e}"),
            })?;

        self.convert_api_response(api_response)
    }

    fn provider_id(&self) -> &'static str {
        "gemini"
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    model_version: Option<String>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Message;

    #[test]
    fn test_provider_creation() {
        let provider = GeminiProvider::new("test-key").expect("create provider");
        assert_eq!(provider.provider_id(), "gemini");
        assert_eq!(provider.model, "gemini-2.0-flash");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_blank_key_rejected() {
        let result = GeminiProvider::new("  ");
        assert!(matches!(result, Err(LlmError::MissingApiKey { .. })));
    }

    #[test]
    fn test_base_url_override_trims_slash() {
        let provider = GeminiProvider::with_options(
            "test-key",
            "gemini-1.5-pro",
            Some("http://localhost:8080/v1beta/".to_string()),
            Some(5),
        )
        .expect("create provider");
        assert_eq!(provider.base_url, "http://localhost:8080/v1beta");
        assert_eq!(provider.model, "gemini-1.5-pro");
    }

    #[test]
    fn test_api_request_serialization() {
        let provider = GeminiProvider::new("test-key").expect("create provider");
        let request = CompletionRequest {
            messages: vec![Message::user("Listing HTML"), Message::assistant("{}")],
            ..CompletionRequest::new("")
        }
        .with_max_tokens(8192)
        .with_temperature(0.0)
        .with_system_prompt("Return JSON");

        let json = serde_json::to_value(provider.to_api_request(&request)).expect("serialize");

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Return JSON");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(json["generationConfig"]["temperature"], 0.0);
        assert!(json["generationConfig"].get("stopSequences").is_none());
    }

    #[test]
    fn test_response_conversion() {
        let provider = GeminiProvider::new("test-key").expect("create provider");
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "```json\n{}\n```"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3},
            "modelVersion": "gemini-2.0-flash-001"
        }"#;
        let parsed: GeminiResponse = serde_json::from_str(body).expect("parse body");
        let response = provider.convert_api_response(parsed).expect("convert");

        assert_eq!(response.content, "```json\n{}\n```");
        assert_eq!(response.model, "gemini-2.0-flash-001");
        assert_eq!(response.stop_reason.as_deref(), Some("STOP"));
        assert_eq!(response.usage.map(|u| u.total_tokens()), Some(15));
    }

    #[test]
    fn test_blocked_response_is_empty() {
        let provider = GeminiProvider::new("test-key").expect("create provider");
        let parsed: GeminiResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#)
                .expect("parse body");
        let result = provider.convert_api_response(parsed);
        assert!(matches!(result, Err(LlmError::EmptyResponse { .. })));
    }
}
