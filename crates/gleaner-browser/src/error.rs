use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("script failed: {0}")]
    ScriptError(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("download failed for {url}: {reason}")]
    DownloadError { url: String, reason: String },
}

impl BrowserError {
    /// Whether the error is a timeout waiting on the page.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
