//! Persistence seams used by the orchestrator.
//!
//! [`gleaner_db::Database`] implements both traits; tests substitute
//! in-memory fakes or an in-memory SQLite database.

use crate::error::{Result, ScrapeError};
use crate::selectors::SelectorBundle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gleaner_core::{SourceId, SourceStatus, SourceUrl};
use gleaner_db::{articles, authors, sources, Database, IngestOutcome, NewArticle, SourceRecord, SourceUpsert};

/// Registry of sources, their selector bundles and status.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Insert or replace the source keyed by `url`. The bundle and both
    /// flags are written together and the source becomes available.
    async fn upsert_source(
        &self,
        url: &str,
        bundle: Option<&SelectorBundle>,
        wants_ai: bool,
        wants_region: bool,
    ) -> Result<SourceId>;

    async fn list_sources(&self) -> Result<Vec<SourceRecord>>;

    async fn get_source(&self, id: SourceId) -> Result<SourceRecord>;

    async fn set_status(&self, id: SourceId, status: SourceStatus) -> Result<()>;

    async fn touch_updated_at(&self, id: SourceId, at: DateTime<Utc>) -> Result<()>;
}

/// Destination for harvested articles.
#[async_trait]
pub trait ArticleSink: Send + Sync {
    /// Id of the author with this name; a missing name maps to a shared
    /// "unknown" author.
    async fn get_or_create_author(
        &self,
        name: Option<&str>,
        url: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<i64>;

    /// Store an article. Re-adding a known URL merges instead of
    /// duplicating.
    async fn add_article(&self, article: &NewArticle) -> Result<IngestOutcome>;
}

/// Validate `url` and register it without a bundle. Re-registering an
/// existing source clears its bundle and makes it available again.
pub async fn register_source(
    store: &dyn SourceStore,
    url: &str,
    wants_ai: bool,
    wants_region: bool,
) -> Result<SourceId> {
    let url = SourceUrl::new(url).map_err(|e| ScrapeError::InvalidUrl(e.to_string()))?;
    let id = store
        .upsert_source(url.as_str(), None, wants_ai, wants_region)
        .await?;
    tracing::info!(source_id = %id, url = %url, wants_ai, wants_region, "Source registered");
    Ok(id)
}

#[async_trait]
impl SourceStore for Database {
    async fn upsert_source(
        &self,
        url: &str,
        bundle: Option<&SelectorBundle>,
        wants_ai: bool,
        wants_region: bool,
    ) -> Result<SourceId> {
        let selectors = bundle.map(SelectorBundle::to_json);
        let id = sources::upsert_source(
            self.pool(),
            &SourceUpsert {
                url,
                selectors: selectors.as_ref(),
                wants_ai,
                wants_region,
            },
        )
        .await?;
        Ok(id)
    }

    async fn list_sources(&self) -> Result<Vec<SourceRecord>> {
        Ok(sources::list_sources(self.pool()).await?)
    }

    async fn get_source(&self, id: SourceId) -> Result<SourceRecord> {
        Ok(sources::get_source(self.pool(), id).await?)
    }

    async fn set_status(&self, id: SourceId, status: SourceStatus) -> Result<()> {
        Ok(sources::set_status(self.pool(), id, status).await?)
    }

    async fn touch_updated_at(&self, id: SourceId, at: DateTime<Utc>) -> Result<()> {
        Ok(sources::touch_updated_at(self.pool(), id, at).await?)
    }
}

#[async_trait]
impl ArticleSink for Database {
    async fn get_or_create_author(
        &self,
        name: Option<&str>,
        url: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<i64> {
        Ok(authors::get_or_create_author(self.pool(), name, url, image_url).await?)
    }

    async fn add_article(&self, article: &NewArticle) -> Result<IngestOutcome> {
        Ok(articles::add_article(self.pool(), article).await?)
    }
}
