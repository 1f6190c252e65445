//! Selector inference: ask a language model which CSS selectors fit a page.
//!
//! The page HTML is reduced to its `<body>` without scripts, styles,
//! `<noscript>` blocks or comments, inserted into a page-type prompt at the
//! `[HTML CODE HERE]` placeholder, and the reply's fenced JSON block is read
//! back as [`InferredSelectors`].

use crate::error::InferenceError;
use crate::selectors::InferredSelectors;
use async_trait::async_trait;
use gleaner_core::{InferenceConfig, LlmConfig, PageTemplate};
use gleaner_llm::{CompletionRequest, LlmProvider};
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, OnceLock};

/// Placeholder replaced by the cleaned page HTML.
pub const HTML_PLACEHOLDER: &str = "[HTML CODE HERE]";

const LISTING_PROMPT: &str = include_str!("../templates/listing_prompt.txt");
const DETAIL_PROMPT: &str = include_str!("../templates/detail_prompt.txt");

/// Produces selectors for a rendered page.
#[async_trait]
pub trait SelectorInference: Send + Sync {
    /// Infer selectors for `html`, a page of kind `template`.
    async fn infer(
        &self,
        template: PageTemplate,
        html: &str,
    ) -> Result<InferredSelectors, InferenceError>;
}

fn body_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<body[^>]*>(.*?)</body>").expect("valid regex"))
}

fn noise_re() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            r"(?is)<script\b.*?</script>",
            r"(?s)<!--.*?-->",
            r"(?is)<noscript\b.*?</noscript>",
            r"(?is)<style\b.*?</style>",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
    })
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json|python)[ \t]*\r?\n(.*?)```").expect("valid regex"))
}

/// Reduce page HTML to the body markup a model needs to see.
pub fn clean_html(html: &str) -> Result<String, InferenceError> {
    let body = body_re()
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or(InferenceError::NoBody)?
        .as_str();

    let mut cleaned = body.to_string();
    for re in noise_re() {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }

    let cleaned = cleaned
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    tracing::debug!(
        original_len = body.len(),
        cleaned_len = cleaned.len(),
        "Cleaned page HTML for inference"
    );
    Ok(cleaned)
}

/// Read the first fenced `json` (or `python`) block of a model reply.
pub fn parse_reply(reply: &str) -> Result<InferredSelectors, InferenceError> {
    let block = fence_re()
        .captures(reply)
        .and_then(|c| c.get(1))
        .ok_or(InferenceError::NoCodeBlock)?
        .as_str()
        .trim();

    match serde_json::from_str(block) {
        Ok(selectors) => Ok(selectors),
        Err(first) => serde_json::from_str(&python_literal_to_json(block))
            .map_err(|_| InferenceError::InvalidJson(first)),
    }
}

/// Rewrite a Python dict literal as JSON. Single-quoted strings become
/// double-quoted; `None`, `True` and `False` are translated only outside
/// strings.
fn python_literal_to_json(block: &str) -> String {
    let mut out = String::with_capacity(block.len());
    let mut chars = block.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                let quote = c;
                out.push('"');
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some('\'') => out.push('\''),
                            Some(escaped) => {
                                out.push('\\');
                                out.push(escaped);
                            }
                            None => out.push('\\'),
                        },
                        c if c == quote => break,
                        '"' => out.push_str("\\\""),
                        c => out.push(c),
                    }
                }
                out.push('"');
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !(next.is_alphanumeric() || next == '_') {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                out.push_str(match word.as_str() {
                    "None" => "null",
                    "True" => "true",
                    "False" => "false",
                    other => other,
                });
            }
            c => out.push(c),
        }
    }
    out
}

/// Prompt texts per page type.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    listing: String,
    detail: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            listing: LISTING_PROMPT.to_string(),
            detail: DETAIL_PROMPT.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Embedded prompts, replaced by any override files in configuration.
    pub fn from_config(config: &InferenceConfig) -> Result<Self, InferenceError> {
        let mut templates = Self::default();
        if let Some(path) = &config.listing_template {
            templates.listing = read_template(path)?;
        }
        if let Some(path) = &config.detail_template {
            templates.detail = read_template(path)?;
        }
        Ok(templates)
    }

    pub fn get(&self, template: PageTemplate) -> &str {
        match template {
            PageTemplate::Listing => &self.listing,
            PageTemplate::Detail => &self.detail,
        }
    }

    /// Build the full prompt for a page.
    pub fn render(&self, template: PageTemplate, html: &str) -> Result<String, InferenceError> {
        let text = self.get(template);
        if !text.contains(HTML_PLACEHOLDER) {
            return Err(InferenceError::MissingPlaceholder {
                template: template.to_string(),
            });
        }
        Ok(text.replace(HTML_PLACEHOLDER, &clean_html(html)?))
    }
}

fn read_template(path: &Path) -> Result<String, InferenceError> {
    let text = std::fs::read_to_string(path).map_err(|source| InferenceError::Template {
        path: path.to_path_buf(),
        source,
    })?;
    if !text.contains(HTML_PLACEHOLDER) {
        return Err(InferenceError::MissingPlaceholder {
            template: path.display().to_string(),
        });
    }
    Ok(text)
}

/// Selector inference backed by an [`LlmProvider`].
pub struct LlmSelectorInference {
    provider: Arc<dyn LlmProvider>,
    templates: PromptTemplates,
    max_tokens: u32,
    temperature: f32,
}

impl LlmSelectorInference {
    pub fn new(provider: Arc<dyn LlmProvider>, templates: PromptTemplates) -> Self {
        let defaults = LlmConfig::default();
        Self {
            provider,
            templates,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
        }
    }

    /// Use the completion limits from configuration.
    #[must_use]
    pub fn with_limits(mut self, config: &LlmConfig) -> Self {
        self.max_tokens = config.max_tokens;
        self.temperature = config.temperature;
        self
    }
}

#[async_trait]
impl SelectorInference for LlmSelectorInference {
    async fn infer(
        &self,
        template: PageTemplate,
        html: &str,
    ) -> Result<InferredSelectors, InferenceError> {
        let prompt = self.templates.render(template, html)?;
        let request = CompletionRequest::new(prompt)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        tracing::info!(
            provider = self.provider.provider_id(),
            template = %template,
            prompt_chars = request.prompt_chars(),
            "Requesting selector inference"
        );

        let response = self.provider.complete(request).await?;
        let selectors = parse_reply(&response.content).map_err(|e| {
            tracing::warn!(template = %template, error = %e, "Unusable inference reply");
            e
        })?;

        tracing::debug!(template = %template, selectors = ?selectors, "Inferred selectors");
        Ok(selectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gleaner_llm::CompletionResponse;
    use std::sync::Mutex;

    struct CannedProvider {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn complete(&self, request: CompletionRequest) -> gleaner_llm::Result<CompletionResponse> {
            self.prompts
                .lock()
                .unwrap()
                .push(request.messages[0].content.clone());
            Ok(CompletionResponse {
                content: self.reply.clone(),
                model: "canned".to_string(),
                stop_reason: None,
                usage: None,
            })
        }

        fn provider_id(&self) -> &str {
            "canned"
        }
    }

    const PAGE: &str = r#"<html><head><title>x</title></head>
        <body class="home">
          <script>var tracking = 1;</script>
          <!-- banner -->
          <style>.a { color: red }</style>

          <noscript>enable js</noscript>
          <h2><a href="/a">Story</a></h2>
        </body></html>"#;

    #[test]
    fn test_clean_html() {
        let cleaned = clean_html(PAGE).unwrap();
        assert_eq!(cleaned, r#"<h2><a href="/a">Story</a></h2>"#);
        assert!(matches!(clean_html("<div>no body</div>"), Err(InferenceError::NoBody)));
    }

    #[test]
    fn test_parse_json_reply() {
        let reply = "Here you go:\n```json\n{\"title\": \"h2 a\", \"link\": \"h2 a\", \"next_button\": null}\n```\nDone.";
        let selectors = parse_reply(reply).unwrap();
        assert_eq!(selectors.title.as_deref(), Some("h2 a"));
        assert!(selectors.next_button.is_none());
    }

    #[test]
    fn test_parse_python_reply() {
        let reply = "```python\n{\"body\": \".content\", \"post_date\": \"time\", \"author\": None}\n```";
        let selectors = parse_reply(reply).unwrap();
        assert_eq!(selectors.body.as_deref(), Some(".content"));
        assert!(selectors.author.is_none());
    }

    #[test]
    fn test_parse_single_quoted_dict() {
        let reply = "```python\n{'title': 'h2.None a', 'link': \"a[data-ok='True']\", \
                     'next_button': None, 'load_more_button': 'button[aria-label=\\'More\\']', \
                     'body': 'say \"hi\"'}\n```";
        let selectors = parse_reply(reply).unwrap();
        assert_eq!(selectors.title.as_deref(), Some("h2.None a"));
        assert_eq!(selectors.link.as_deref(), Some("a[data-ok='True']"));
        assert!(selectors.next_button.is_none());
        assert_eq!(selectors.load_more_button.as_deref(), Some("button[aria-label='More']"));
        assert_eq!(selectors.body.as_deref(), Some("say \"hi\""));
    }

    #[test]
    fn test_reply_failures() {
        assert!(matches!(parse_reply("no code here"), Err(InferenceError::NoCodeBlock)));
        assert!(matches!(
            parse_reply("```json\n{not json\n```"),
            Err(InferenceError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_template_override_needs_placeholder() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("listing.txt");
        std::fs::write(&good, "Find selectors:\n[HTML CODE HERE]").unwrap();
        let bad = dir.path().join("detail.txt");
        std::fs::write(&bad, "no placeholder").unwrap();

        let templates = PromptTemplates::from_config(&InferenceConfig {
            listing_template: Some(good),
            detail_template: None,
        })
        .unwrap();
        assert!(templates.get(PageTemplate::Listing).starts_with("Find selectors"));
        assert!(templates.get(PageTemplate::Detail).contains(HTML_PLACEHOLDER));

        let err = PromptTemplates::from_config(&InferenceConfig {
            listing_template: None,
            detail_template: Some(bad),
        })
        .unwrap_err();
        assert!(matches!(err, InferenceError::MissingPlaceholder { .. }));
    }

    #[tokio::test]
    async fn test_llm_inference_end_to_end() {
        let provider = Arc::new(CannedProvider {
            reply: "```json\n{\"title\": \"h2 a\", \"link\": \"h2 a\"}\n```".to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let inference = LlmSelectorInference::new(provider.clone(), PromptTemplates::default());

        let selectors = inference.infer(PageTemplate::Listing, PAGE).await.unwrap();
        assert_eq!(selectors.link.as_deref(), Some("h2 a"));

        let prompts = provider.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(r#"<h2><a href="/a">Story</a></h2>"#));
        assert!(!prompts[0].contains("tracking"));
        assert!(!prompts[0].contains(HTML_PLACEHOLDER));
    }
}
