//! Gleaner Scraper - Adaptive harvesting of news listings.
//!
//! This crate drives the scrape cycle. It learns CSS selectors for each
//! source through an LLM, walks paginated and infinite-scroll listings,
//! filters titles against keyword triggers, normalizes multilingual dates
//! and stores the resulting articles.
//!
//! # Features
//!
//! - Lazy selector acquisition on a source's first cycle
//! - One selector regeneration when a stored bundle stops matching a page
//! - Bounded retries per source; exhausted sources are set aside
//! - Relevance gates for AI and regional topics
//! - Freshness cutoff against a global floor and the last successful cycle
//! - Optional refresh of a downloadable statistics dataset each cycle
//!
//! # Example
//!
//! ```rust,ignore
//! use gleaner_scraper::{Orchestrator, OrchestratorSettings};
//! use std::sync::Arc;
//!
//! let orchestrator = Orchestrator::new(
//!     session,
//!     Arc::new(database.clone()),
//!     Arc::new(database),
//!     Arc::new(inference),
//!     Arc::new(relevance),
//! )
//! .with_settings(OrchestratorSettings::from(&config.scraping));
//!
//! orchestrator.register_source("https://example.com/news", true, false).await?;
//! let report = orchestrator.run_cycle().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod dates;
#[allow(missing_docs)]
pub mod error;
#[allow(missing_docs)]
pub mod extract;
#[allow(missing_docs)]
pub mod inference;
#[allow(missing_docs)]
pub mod orchestrator;
pub mod relevance;
#[allow(missing_docs)]
pub mod selectors;
#[allow(missing_docs)]
pub mod statistics;
pub mod store;
#[allow(missing_docs)]
pub mod summarize;

// Re-export commonly used types
pub use dates::DateNormalizer;
pub use error::{BundleError, DateParseError, FailureClass, InferenceError, Result, ScrapeError};
pub use inference::{LlmSelectorInference, PromptTemplates, SelectorInference};
pub use orchestrator::{CycleReport, Orchestrator, OrchestratorSettings, SourceOutcome};
pub use relevance::{add_trigger, remove_trigger, RelevancePolicy, TriggerSet};
pub use selectors::{InferredSelectors, SelectorBundle};
pub use statistics::{refresh_statistics, RefreshOutcome, StatisticsStore};
pub use store::{register_source, ArticleSink, SourceStore};
pub use summarize::{LlmSummarizer, Summarizer};
