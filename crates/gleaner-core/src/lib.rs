//! Gleaner Core - Foundation crate for the Gleaner harvesting engine.
//!
//! This crate provides shared types, error handling and configuration
//! management that all other Gleaner crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`SourceId`, `SourceUrl`, `SourceStatus`, `Timestamp`)
//!
//! # Example
//!
//! ```rust
//! use gleaner_core::{AppConfig, SourceStatus};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.scraping.max_attempts, 3);
//! assert_eq!("available".parse::<SourceStatus>().ok(), Some(SourceStatus::Available));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserConfig, DatabaseConfig, GeneralConfig, InferenceConfig, LlmConfig,
    RelevanceConfig, ScrapingConfig, StatisticsConfig,
};
pub use error::{ConfigError, ConfigResult, GleanerError, Result};
pub use types::{PageTemplate, SourceId, SourceStatus, SourceUrl, Timestamp};
