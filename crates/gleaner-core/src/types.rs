//! Shared types used across the Gleaner engine.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::GleanerError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Database identifier of a registered source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(i64);

impl SourceId {
    /// Wrap a raw row id.
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw row id.
    #[must_use]
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SourceId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Newtype for a source listing URL with validation.
///
/// Source URLs must be absolute `http` or `https` URLs with a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceUrl(String);

impl SourceUrl {
    /// Create a new `SourceUrl` from a string.
    ///
    /// # Errors
    /// Returns error if the URL has no http(s) scheme or no host.
    pub fn new(url: impl Into<String>) -> Result<Self, GleanerError> {
        let url = url.into();
        let trimmed = url.trim();
        Self::validate(trimmed)?;
        Ok(Self(trimmed.to_string()))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(url: &str) -> Result<(), GleanerError> {
        static URL_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = URL_REGEX
            .get_or_init(|| Regex::new(r"^(?i)https?://[^/\s?#]+(?:[/?#]\S*)?$").expect("valid regex"));

        if regex.is_match(url) {
            Ok(())
        } else {
            Err(GleanerError::Validation(format!(
                "invalid source URL: must be an absolute http(s) URL, got '{url}'"
            )))
        }
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a source.
///
/// `Unavailable` is terminal until the source is registered again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// A scrape of this source is in progress
    Fetching,
    /// Ready to be scraped
    Available,
    /// Retry budget exhausted; skipped by the orchestrator
    Unavailable,
}

impl SourceStatus {
    /// Stable string form used for persistence.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Available => "available",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceStatus {
    type Err = GleanerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fetching" => Ok(Self::Fetching),
            "available" => Ok(Self::Available),
            "unavailable" => Ok(Self::Unavailable),
            other => Err(GleanerError::Validation(format!(
                "unknown source status '{other}'"
            ))),
        }
    }
}

/// The kind of page a selector-inference request describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageTemplate {
    /// A listing page: titles, links and navigation controls
    Listing,
    /// An article detail page: body, dates, image and author
    Detail,
}

impl fmt::Display for PageTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listing => f.write_str("listing"),
            Self::Detail => f.write_str("detail"),
        }
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `DateTime<Utc>`.
    #[must_use]
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Parse a timestamp from an RFC3339 string.
    pub fn from_rfc3339(s: &str) -> Result<Self, GleanerError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| Self(dt.with_timezone(&Utc)))
            .map_err(|e| GleanerError::Validation(format!("invalid timestamp: {e}")))
    }

    /// Format as RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get seconds since Unix epoch.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.0.timestamp()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}
