//! Optional article summarization before storage.

use async_trait::async_trait;
use gleaner_core::LlmConfig;
use gleaner_llm::{CompletionRequest, LlmError, LlmProvider};
use std::sync::Arc;

const SUMMARY_SYSTEM_PROMPT: &str = "You summarize news articles. Reply with a concise \
summary of three to five sentences in the same language as the article. Reply with the \
summary text only.";

/// Shortens an article body.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, title: &str, body: &str) -> Result<String, LlmError>;
}

/// Summarizer backed by an [`LlmProvider`].
pub struct LlmSummarizer {
    provider: Arc<dyn LlmProvider>,
    max_tokens: u32,
    temperature: f32,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, title: &str, body: &str) -> Result<String, LlmError> {
        let request = CompletionRequest::new(format!("Title: {title}\n\n{body}"))
            .with_system_prompt(SUMMARY_SYSTEM_PROMPT)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        let response = self.provider.complete(request).await?;
        let summary = response.content.trim();
        if summary.is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: self.provider.provider_id().to_string(),
            });
        }

        tracing::debug!(
            body_len = body.len(),
            summary_len = summary.len(),
            "Summarized article"
        );
        Ok(summary.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gleaner_llm::CompletionResponse;

    struct Echo(&'static str);

    #[async_trait]
    impl LlmProvider for Echo {
        async fn complete(&self, request: CompletionRequest) -> gleaner_llm::Result<CompletionResponse> {
            assert!(request.system_prompt.is_some());
            assert!(request.messages[0].content.starts_with("Title: "));
            Ok(CompletionResponse {
                content: self.0.to_string(),
                model: "echo".into(),
                stop_reason: None,
                usage: None,
            })
        }

        fn provider_id(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_summary_trimmed() {
        let summarizer = LlmSummarizer::new(Arc::new(Echo("  Short.  \n")), &LlmConfig::default());
        assert_eq!(summarizer.summarize("T", "Long body").await.unwrap(), "Short.");
    }

    #[tokio::test]
    async fn test_empty_summary_is_error() {
        let summarizer = LlmSummarizer::new(Arc::new(Echo("   ")), &LlmConfig::default());
        assert!(matches!(
            summarizer.summarize("T", "Long body").await,
            Err(LlmError::EmptyResponse { .. })
        ));
    }
}
