//! Configuration management for Gleaner.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use chrono::{NaiveDate, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/gleaner/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General application settings
    pub general: GeneralConfig,
    /// Scrape cycle behavior
    pub scraping: ScrapingConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// LLM provider settings
    pub llm: LlmConfig,
    /// Selector inference prompt settings
    pub inference: InferenceConfig,
    /// Topical relevance trigger lists
    pub relevance: RelevanceConfig,
    /// Database settings
    pub database: DatabaseConfig,
    /// Statistics dataset snapshot
    pub statistics: StatisticsConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `GLEANER_HEADLESS`: Override browser headless mode (true/false)
    /// - `GLEANER_DATABASE_PATH`: Override the SQLite database path
    /// - `GLEANER_CYCLE_INTERVAL_MINUTES`: Override the scrape cycle interval
    /// - `GLEANER_LLM_PROVIDER`: Override the LLM provider (`gemini` or `ollama`)
    /// - `GLEANER_LLM_API_KEY`: API key for hosted LLM providers
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides in place.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("GLEANER_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("GLEANER_DATABASE_PATH") {
            if !val.trim().is_empty() {
                tracing::debug!("Override database.path from env: {}", val);
                self.database.path = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("GLEANER_CYCLE_INTERVAL_MINUTES") {
            if let Ok(minutes) = val.parse() {
                self.general.cycle_interval_minutes = minutes;
                tracing::debug!("Override general.cycle_interval_minutes from env: {}", minutes);
            }
        }

        if let Ok(val) = std::env::var("GLEANER_LLM_PROVIDER") {
            tracing::debug!("Override llm.provider from env: {}", val);
            self.llm.provider = val;
        }

        if let Ok(val) = std::env::var("GLEANER_LLM_API_KEY") {
            if !val.is_empty() {
                self.llm.api_key = Some(val);
            }
        }
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scraping.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scraping.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scraping.max_pages == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scraping.max_pages".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.statistics.max_age_days == 0 {
            return Err(ConfigError::InvalidValue {
                field: "statistics.max_age_days".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !matches!(self.llm.provider.as_str(), "gemini" | "ollama") {
            return Err(ConfigError::InvalidValue {
                field: "llm.provider".to_string(),
                reason: format!("unknown provider '{}'", self.llm.provider),
            });
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/gleaner/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("org", "gleaner", "gleaner").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses `general.data_dir` when set, otherwise XDG base directories:
    /// `~/.local/share/gleaner`
    pub fn data_dir(&self) -> ConfigResult<PathBuf> {
        if let Some(dir) = &self.general.data_dir {
            return Ok(dir.clone());
        }
        let dirs = ProjectDirs::from("org", "gleaner", "gleaner").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Resolve the SQLite database path.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(self.data_dir()?.join("gleaner.db")),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override for the data directory
    pub data_dir: Option<PathBuf>,
    /// Minutes between scrape cycles
    pub cycle_interval_minutes: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            cycle_interval_minutes: 60,
        }
    }
}

/// Scrape cycle behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Attempts per source per cycle before it is marked unavailable
    pub max_attempts: u32,
    /// Maximum pages (or scroll loads) consumed per listing
    pub max_pages: usize,
    /// Timeout for locating a navigation control, in milliseconds
    pub control_timeout_ms: u64,
    /// Pause after clicking a navigation control, in milliseconds
    pub settle_delay_ms: u64,
    /// Interval between scroll-height polls, in milliseconds
    pub scroll_poll_interval_ms: u64,
    /// Upper bound on scroll-height polls before a page counts as rendered
    pub max_scroll_polls: u32,
    /// Articles published before this date are never harvested
    pub not_before: Option<NaiveDate>,
    /// Articles older than this many days are never harvested
    pub max_article_age_days: Option<u32>,
    /// Summarize article bodies before storing them
    pub summarize: bool,
}

impl ScrapingConfig {
    /// The effective global freshness floor: the later of `not_before` and
    /// `max_article_age_days` counted back from today.
    #[must_use]
    pub fn freshness_floor(&self) -> Option<NaiveDate> {
        let by_age = self.max_article_age_days.and_then(|days| {
            Utc::now()
                .date_naive()
                .checked_sub_days(chrono::Days::new(u64::from(days)))
        });
        match (self.not_before, by_age) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_pages: 20,
            control_timeout_ms: 10_000,
            settle_delay_ms: 2_000,
            scroll_poll_interval_ms: 500,
            max_scroll_polls: 40,
            not_before: None,
            max_article_age_days: None,
            summarize: false,
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// User agent override
    pub user_agent: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            navigation_timeout_secs: 30,
            user_agent: None,
        }
    }
}

/// LLM provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider: `gemini` or `ollama`
    pub provider: String,
    /// Model name
    pub model: String,
    /// Endpoint override (Ollama server URL or Gemini base URL)
    pub endpoint: Option<String>,
    /// API key, read from `GLEANER_LLM_API_KEY` only
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Maximum tokens for completions
    pub max_tokens: u32,
    /// Temperature for completions
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            endpoint: None,
            api_key: None,
            max_tokens: 8192,
            temperature: 0.0,
            timeout_secs: 120,
        }
    }
}

/// Selector inference prompt settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Replacement prompt template for listing pages
    pub listing_template: Option<PathBuf>,
    /// Replacement prompt template for detail pages
    pub detail_template: Option<PathBuf>,
}

/// Topical relevance trigger lists.
///
/// Each file holds one trigger per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    /// Whole-word triggers for the AI gate
    pub ai_words: PathBuf,
    /// Phrase triggers for the AI gate
    pub ai_phrases: PathBuf,
    /// Whole-word triggers for the region gate
    pub region_words: PathBuf,
    /// Phrase triggers for the region gate
    pub region_phrases: PathBuf,
    /// Also evaluate gates a source does not require
    pub strict_gates: bool,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            ai_words: PathBuf::from("triggers/ai_words.txt"),
            ai_phrases: PathBuf::from("triggers/ai_phrases.txt"),
            region_words: PathBuf::from("triggers/region_words.txt"),
            region_phrases: PathBuf::from("triggers/region_phrases.txt"),
            strict_gates: false,
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path; defaults to `<data_dir>/gleaner.db`
    pub path: Option<PathBuf>,
    /// Connection pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
        }
    }
}

/// The statistics dataset refreshed alongside scrape cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Refresh the dataset at the start of every cycle
    pub enabled: bool,
    /// Dataset name; the storage key
    pub name: String,
    /// Page carrying the download control
    pub page_url: String,
    /// Selector of the element whose URL points at the file
    pub link_selector: String,
    /// A stored snapshot younger than this is kept
    pub max_age_days: u32,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "AI Preparedness Index".to_string(),
            page_url: "https://www.imf.org/external/datamapper/AI_PI@AIPI/ADVEC/EME/LIC".to_string(),
            link_selector: r#"button.dm-share-button[data-type="excel"]"#.to_string(),
            max_age_days: 3,
        }
    }
}
