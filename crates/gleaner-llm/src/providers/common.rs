//! Common utilities shared across LLM providers.

use crate::error::{LlmError, Result};
use crate::provider::Role;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Build a standard HTTP client with common timeout settings.
///
/// # Arguments
/// * `timeout_secs` - Timeout in seconds (defaults to 60 if not specified)
///
/// # Errors
/// Returns error if the HTTP client cannot be created.
pub fn build_http_client(timeout_secs: Option<u64>) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.unwrap_or(60)))
        .build()
        .map_err(|e| LlmError::Internal(format!("failed to create HTTP client: {e}")))
}

/// Convert internal Role enum to Gemini-specific role string.
///
/// Gemini uses "user" and "model" instead of "user" and "assistant".
/// System prompts are handled separately.
#[must_use]
pub fn convert_role_gemini(role: Role) -> &'static str {
    match role {
        Role::System | Role::User => "user",
        Role::Assistant => "model",
    }
}

/// Map a non-success HTTP status to the matching error.
#[must_use]
pub fn status_error(provider: &str, status: StatusCode, message: String) -> LlmError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::AuthenticationFailed {
            provider: provider.to_string(),
            message,
        },
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded {
            provider: provider.to_string(),
            message,
        },
        _ => LlmError::ApiError {
            provider: provider.to_string(),
            status: status.as_u16(),
            message,
        },
    }
}

/// Pass successful responses through; turn failures into errors carrying
/// the response body.
pub async fn ensure_success(provider: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(status_error(provider, status, error_text))
}
