//! Statistics dataset refresh.
//!
//! A configured page carries a control whose URL points at a dataset file.
//! The file is fetched through the browser session, so cookies and
//! rendering match a visitor's, and stored whole under the dataset name.
//! A snapshot younger than `max_age_days` is left alone.

use crate::error::{Result, ScrapeError};
use crate::extract::{is_well_formed_url, select_url};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use gleaner_browser::BrowserSession;
use gleaner_core::StatisticsConfig;
use gleaner_db::{statistics, Database};
use scraper::Html;
use url::Url;

/// Storage for downloaded dataset snapshots.
#[async_trait]
pub trait StatisticsStore: Send + Sync {
    /// When the snapshot named `name` was last replaced.
    async fn snapshot_updated_at(&self, name: &str) -> Result<Option<DateTime<Utc>>>;

    /// Replace the snapshot named `name`.
    async fn store_snapshot(&self, name: &str, source_url: &str, data: &[u8]) -> Result<()>;
}

#[async_trait]
impl StatisticsStore for Database {
    async fn snapshot_updated_at(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(statistics::get_updated_at(self.pool(), name).await?)
    }

    async fn store_snapshot(&self, name: &str, source_url: &str, data: &[u8]) -> Result<()> {
        statistics::upsert_statistics(self.pool(), name, source_url, data, Utc::now()).await?;
        Ok(())
    }
}

/// Result of one refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The stored snapshot is recent enough
    Fresh { updated_at: DateTime<Utc> },
    /// The page had no usable download URL
    NoDownloadLink,
    /// A new snapshot was stored
    Stored { url: String, bytes: usize },
}

/// Download the configured dataset unless a recent snapshot exists.
pub async fn refresh_statistics<B>(
    session: &mut B,
    store: &dyn StatisticsStore,
    config: &StatisticsConfig,
) -> Result<RefreshOutcome>
where
    B: BrowserSession + ?Sized,
{
    let max_age = Duration::days(i64::from(config.max_age_days));
    if let Some(updated_at) = store.snapshot_updated_at(&config.name).await? {
        if Utc::now() - updated_at < max_age {
            tracing::debug!(name = %config.name, %updated_at, "Statistics snapshot is recent");
            return Ok(RefreshOutcome::Fresh { updated_at });
        }
    }

    let base = Url::parse(&config.page_url).map_err(|e| ScrapeError::InvalidUrl(e.to_string()))?;
    session.navigate(&config.page_url).await?;
    let html = session.current_html().await?;

    let link = select_url(&Html::parse_document(&html), &config.link_selector, &base)
        .filter(|u| is_well_formed_url(u));
    let Some(link) = link else {
        tracing::warn!(
            name = %config.name,
            page = %config.page_url,
            selector = %config.link_selector,
            "No download link for statistics dataset"
        );
        return Ok(RefreshOutcome::NoDownloadLink);
    };

    let data = session.download(&link).await?;
    store.store_snapshot(&config.name, &link, &data).await?;
    tracing::info!(name = %config.name, url = %link, bytes = data.len(), "Statistics snapshot refreshed");

    Ok(RefreshOutcome::Stored {
        url: link,
        bytes: data.len(),
    })
}
