use crate::error::{BrowserError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Script returning the rendered document height.
pub const SCROLL_HEIGHT_SCRIPT: &str = "document.body.scrollHeight";

/// Script scrolling the viewport to the bottom of the document.
pub const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// Script returning the current location.
pub const LOCATION_SCRIPT: &str = "window.location.href";

/// An exclusively owned handle to a browser automation backend.
///
/// Every operation takes `&mut self`: one session drives one tab and callers
/// serialize access to it.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate to a URL and wait for the load to finish
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Rendered HTML of the current document
    async fn current_html(&mut self) -> Result<String>;

    /// URL of the current document
    async fn current_url(&mut self) -> Result<String>;

    /// Evaluate a script expression and return its JSON value
    async fn execute_script(&mut self, script: &str) -> Result<serde_json::Value>;

    /// Whether any element currently matches the selector
    async fn element_exists(&mut self, selector: &str) -> Result<bool>;

    /// Wait until an element matching the selector is visible and enabled
    async fn wait_for_clickable(&mut self, selector: &str, timeout: Duration) -> Result<()>;

    /// Scroll the first matching element into view
    async fn scroll_into_view(&mut self, selector: &str) -> Result<()>;

    /// Click the first matching element from page script
    async fn script_click(&mut self, selector: &str) -> Result<()>;

    /// Click the first matching element with a simulated pointer event
    async fn pointer_click(&mut self, selector: &str) -> Result<()>;

    /// Fetch raw bytes with the page's cookies and origin
    async fn download(&mut self, url: &str) -> Result<Vec<u8>>;

    /// Current document height in pixels
    async fn scroll_height(&mut self) -> Result<u64> {
        let value = self.execute_script(SCROLL_HEIGHT_SCRIPT).await?;
        value
            .as_u64()
            .or_else(|| value.as_f64().map(|h| h.max(0.0) as u64))
            .ok_or_else(|| BrowserError::ScriptError(format!("scroll height not a number: {value}")))
    }

    /// Scroll to the bottom of the document
    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.execute_script(SCROLL_TO_BOTTOM_SCRIPT).await?;
        Ok(())
    }
}

/// Helper to extract domain from URL
pub fn extract_domain(url: &str) -> Result<String> {
    let url = url::Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {}", e)))?;

    url.host_str()
        .ok_or_else(|| BrowserError::NavigationError("No host in URL".to_string()))
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://news.example.com/tech/page/2").unwrap(),
            "news.example.com"
        );
        assert_eq!(
            extract_domain("http://example.org:8080/").unwrap(),
            "example.org"
        );
    }

    #[test]
    fn test_extract_domain_invalid() {
        assert!(extract_domain("not-a-url").is_err());
        assert!(extract_domain("data:text/plain,hello").is_err());
    }
}
