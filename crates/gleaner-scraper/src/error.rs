use gleaner_browser::BrowserError;
use gleaner_core::{GleanerError, SourceId};
use gleaner_db::DatabaseError;
use gleaner_llm::LlmError;
use std::path::PathBuf;
use thiserror::Error;

/// A date string no pattern could read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized date: {raw:?}")]
pub struct DateParseError {
    pub raw: String,
}

/// Why a selector bundle was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BundleError {
    #[error("body selector is missing or extracts nothing")]
    MissingBody,

    #[error("post date selector is missing or extracts nothing")]
    MissingPostDate,

    #[error("listing selector `{slot}` is missing")]
    MissingListingSlot { slot: &'static str },

    #[error("selector for `{slot}` is not valid CSS: {selector}")]
    InvalidSelector { slot: &'static str, selector: String },
}

/// Failures while asking the inference service for selectors.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("no <body> element in page HTML")]
    NoBody,

    #[error("prompt template {template} has no HTML placeholder")]
    MissingPlaceholder { template: String },

    #[error("failed to read prompt template {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model reply contains no fenced json block")]
    NoCodeBlock,

    #[error("model reply is not a selector object: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Diagnostic bucket for a failed attempt. All buckets are retried alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// The page could not be rendered or parsed
    Render,
    /// A required selector was absent
    MissingKey,
    /// A selector or element lacked the expected shape
    Attribute,
    /// A value could not be interpreted (usually a date)
    Value,
    /// Anything else
    Generic,
}

impl FailureClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Render => "render",
            Self::MissingKey => "missing-key",
            Self::Attribute => "attribute",
            Self::Value => "value",
            Self::Generic => "generic",
        }
    }
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("a scrape cycle is already running")]
    CycleInProgress,

    #[error("stored selectors for source {source_id} drifted: {reason}")]
    SelectorDrift { source_id: SourceId, reason: String },

    #[error("listing page has no resolvable detail link")]
    NoDetailLink,

    #[error("invalid source URL: {0}")]
    InvalidUrl(String),

    #[error("stored selector bundle is malformed: {0}")]
    MalformedBundle(String),

    #[error("invalid trigger file {path}: {reason}")]
    Triggers { path: PathBuf, reason: String },

    #[error("invalid selector bundle: {0}")]
    Bundle(#[from] BundleError),

    #[error("could not parse post date: {0}")]
    Date(#[from] DateParseError),

    #[error("selector inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScrapeError {
    /// Diagnostic bucket used in attempt logs.
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Browser(_) => FailureClass::Render,
            Self::SelectorDrift { .. }
            | Self::Bundle(
                BundleError::MissingBody
                | BundleError::MissingPostDate
                | BundleError::MissingListingSlot { .. },
            ) => FailureClass::MissingKey,
            Self::MalformedBundle(_)
            | Self::NoDetailLink
            | Self::Bundle(BundleError::InvalidSelector { .. }) => FailureClass::Attribute,
            Self::Date(_) | Self::InvalidUrl(_) => FailureClass::Value,
            _ => FailureClass::Generic,
        }
    }
}

impl From<ScrapeError> for GleanerError {
    fn from(err: ScrapeError) -> Self {
        match err {
            ScrapeError::Browser(e) => GleanerError::Browser(e.to_string()),
            ScrapeError::Database(e) => e.into(),
            ScrapeError::Io(e) => GleanerError::Io(e),
            ScrapeError::Inference(InferenceError::Llm(e)) => GleanerError::Llm(e.to_string()),
            other => GleanerError::Scrape(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_classes() {
        assert_eq!(
            ScrapeError::Browser(BrowserError::Timeout("nav".into())).class(),
            FailureClass::Render
        );
        assert_eq!(
            ScrapeError::Date(DateParseError {
                raw: "soon".into()
            })
            .class(),
            FailureClass::Value
        );
        assert_eq!(
            ScrapeError::Bundle(BundleError::MissingListingSlot { slot: "link" }).class(),
            FailureClass::MissingKey
        );
        assert_eq!(ScrapeError::CycleInProgress.class(), FailureClass::Generic);
        assert_eq!(FailureClass::MissingKey.as_str(), "missing-key");
    }

    #[test]
    fn test_into_gleaner_error() {
        let err: GleanerError = ScrapeError::CycleInProgress.into();
        assert!(matches!(err, GleanerError::Scrape(_)));
    }
}
