//! Source orchestrator: drives one scrape cycle over every registered
//! source.
//!
//! Each source runs through a small state machine. It is marked `fetching`,
//! then up to `max_attempts` attempts are made. Every attempt re-reads the
//! stored selector bundle, acquires one when missing, walks the listing and
//! stores relevant articles. A detail page that the stored bundle cannot
//! read triggers exactly one selector regeneration and fails the attempt.
//! Success returns the source to `available`; running out of attempts marks
//! it `unavailable` until it is registered again.

use crate::dates::DateNormalizer;
use crate::error::{Result, ScrapeError};
use crate::extract::{detail_links, extract_detail, extract_listing, is_well_formed_url, ListingItem};
use crate::inference::SelectorInference;
use crate::relevance::RelevancePolicy;
use crate::selectors::SelectorBundle;
use crate::statistics::{self, RefreshOutcome, StatisticsStore};
use crate::store::{register_source, ArticleSink, SourceStore};
use crate::summarize::Summarizer;
use chrono::{DateTime, NaiveDate, Utc};
use gleaner_browser::{BrowserSession, IteratorConfig, PageIterator, PageStep};
use gleaner_core::{PageTemplate, ScrapingConfig, SourceId, SourceStatus, StatisticsConfig};
use gleaner_db::{IngestOutcome, NewArticle, SourceRecord};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use url::Url;

/// Tunables for a cycle.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Attempts per source per cycle
    pub max_attempts: u32,
    /// Listing walk bounds and timings
    pub iterator: IteratorConfig,
    /// Articles dated before this day end the listing walk
    pub freshness_floor: Option<NaiveDate>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&ScrapingConfig::default())
    }
}

impl From<&ScrapingConfig> for OrchestratorSettings {
    fn from(config: &ScrapingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            iterator: IteratorConfig::from(config),
            freshness_floor: config.freshness_floor(),
        }
    }
}

/// What happened to one source during a cycle.
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub source_id: SourceId,
    pub url: String,
    /// Articles inserted or merged
    pub articles_stored: usize,
    /// Attempts used; zero when the source was skipped
    pub attempts: u32,
    /// Status after the cycle
    pub status: SourceStatus,
    pub last_error: Option<String>,
}

/// Summary of one scrape cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceOutcome>,
}

impl CycleReport {
    pub fn articles_stored(&self) -> usize {
        self.sources.iter().map(|s| s.articles_stored).sum()
    }

    pub fn failed(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| s.attempts > 0 && s.status == SourceStatus::Unavailable)
            .count()
    }
}

/// Whether to keep walking the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Walk {
    Continue,
    Stop,
}

/// Drives scrape cycles with one exclusively owned browser session.
///
/// The session sits behind a lock that doubles as the process-wide
/// single-cycle guard: a cycle that cannot take it fails fast with
/// [`ScrapeError::CycleInProgress`].
pub struct Orchestrator<B> {
    session: Mutex<B>,
    store: Arc<dyn SourceStore>,
    sink: Arc<dyn ArticleSink>,
    inference: Arc<dyn SelectorInference>,
    relevance: Arc<RelevancePolicy>,
    summarizer: Option<Arc<dyn Summarizer>>,
    statistics: Option<(StatisticsConfig, Arc<dyn StatisticsStore>)>,
    dates: DateNormalizer,
    settings: OrchestratorSettings,
}

impl<B: BrowserSession> Orchestrator<B> {
    pub fn new(
        session: B,
        store: Arc<dyn SourceStore>,
        sink: Arc<dyn ArticleSink>,
        inference: Arc<dyn SelectorInference>,
        relevance: Arc<RelevancePolicy>,
    ) -> Self {
        Self {
            session: Mutex::new(session),
            store,
            sink,
            inference,
            relevance,
            summarizer: None,
            statistics: None,
            dates: DateNormalizer::new(),
            settings: OrchestratorSettings::default(),
        }
    }

    /// Refresh the configured statistics dataset before each cycle.
    #[must_use]
    pub fn with_statistics(mut self, config: StatisticsConfig, store: Arc<dyn StatisticsStore>) -> Self {
        self.statistics = Some((config, store));
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    #[must_use]
    pub fn with_date_normalizer(mut self, dates: DateNormalizer) -> Self {
        self.dates = dates;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Register a source, or re-register it to clear its bundle and bring
    /// an unavailable source back.
    pub async fn register_source(
        &self,
        url: &str,
        wants_ai: bool,
        wants_region: bool,
    ) -> Result<SourceId> {
        register_source(self.store.as_ref(), url, wants_ai, wants_region).await
    }

    /// Scrape every registered source once, in registry order.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let mut session = self
            .session
            .try_lock()
            .map_err(|_| ScrapeError::CycleInProgress)?;

        let started_at = Utc::now();
        if let Some((config, store)) = &self.statistics {
            if let Err(e) = statistics::refresh_statistics(&mut *session, store.as_ref(), config).await {
                tracing::warn!(name = %config.name, error = %e, "Statistics refresh failed");
            }
        }

        let sources = self.store.list_sources().await?;
        tracing::info!(sources = sources.len(), "Scrape cycle started");

        let mut outcomes = Vec::with_capacity(sources.len());
        for source in sources {
            let outcome = if source.status == SourceStatus::Unavailable {
                tracing::debug!(source_id = %source.id, url = %source.url, "Skipping unavailable source");
                SourceOutcome {
                    source_id: source.id,
                    url: source.url,
                    articles_stored: 0,
                    attempts: 0,
                    status: SourceStatus::Unavailable,
                    last_error: None,
                }
            } else {
                self.process_source(&mut *session, &source).await
            };
            outcomes.push(outcome);
        }

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            sources: outcomes,
        };
        tracing::info!(
            articles = report.articles_stored(),
            failed = report.failed(),
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Scrape cycle finished"
        );
        Ok(report)
    }

    /// Scrape a single source now, regardless of its status.
    pub async fn scrape_source(&self, id: SourceId) -> Result<SourceOutcome> {
        let mut session = self
            .session
            .try_lock()
            .map_err(|_| ScrapeError::CycleInProgress)?;
        let source = self.store.get_source(id).await?;
        Ok(self.process_source(&mut *session, &source).await)
    }

    /// Refresh the statistics dataset now. `None` when none is configured.
    pub async fn refresh_statistics(&self) -> Result<Option<RefreshOutcome>> {
        let Some((config, store)) = &self.statistics else {
            return Ok(None);
        };
        let mut session = self
            .session
            .try_lock()
            .map_err(|_| ScrapeError::CycleInProgress)?;
        statistics::refresh_statistics(&mut *session, store.as_ref(), config)
            .await
            .map(Some)
    }

    /// Run the attempt loop for one source. Never fails; the outcome
    /// carries the last error instead.
    async fn process_source(&self, session: &mut B, source: &SourceRecord) -> SourceOutcome {
        let id = source.id;
        let mut outcome = SourceOutcome {
            source_id: id,
            url: source.url.clone(),
            articles_stored: 0,
            attempts: 0,
            status: SourceStatus::Fetching,
            last_error: None,
        };

        if let Err(e) = self.store.set_status(id, SourceStatus::Fetching).await {
            tracing::error!(source_id = %id, error = %e, "Could not mark source as fetching");
        }

        for attempt in 1..=self.settings.max_attempts {
            outcome.attempts = attempt;
            tracing::info!(source_id = %id, url = %source.url, attempt, "Scraping source");

            match self.attempt(session, id).await {
                Ok(stored) => {
                    outcome.articles_stored += stored;
                    outcome.status = SourceStatus::Available;
                    outcome.last_error = None;
                    if let Err(e) = self.finish_success(id).await {
                        tracing::error!(source_id = %id, error = %e, "Could not record successful scrape");
                    }
                    tracing::info!(source_id = %id, attempt, articles = stored, "Source scraped");
                    return outcome;
                }
                Err(e) => {
                    tracing::warn!(
                        source_id = %id,
                        attempt,
                        class = e.class().as_str(),
                        error = %e,
                        "Scrape attempt failed"
                    );
                    outcome.last_error = Some(e.to_string());
                }
            }
        }

        outcome.status = SourceStatus::Unavailable;
        if let Err(e) = self.store.set_status(id, SourceStatus::Unavailable).await {
            tracing::error!(source_id = %id, error = %e, "Could not mark source as unavailable");
        }
        tracing::error!(
            source_id = %id,
            attempts = self.settings.max_attempts,
            "Source exhausted its retry budget; marked unavailable"
        );
        outcome
    }

    async fn finish_success(&self, id: SourceId) -> Result<()> {
        self.store.touch_updated_at(id, Utc::now()).await?;
        self.store.set_status(id, SourceStatus::Available).await
    }

    /// One attempt: load the current bundle and walk the listing. Returns
    /// the number of articles stored.
    async fn attempt(&self, session: &mut B, id: SourceId) -> Result<usize> {
        let source = self.store.get_source(id).await?;

        let stored_bundle = match source.selectors.as_ref().map(SelectorBundle::from_json) {
            Some(Ok(bundle)) => Some(bundle),
            Some(Err(e)) => {
                tracing::warn!(source_id = %id, error = %e, "Stored selector bundle unusable; regenerating");
                None
            }
            None => None,
        };
        let bundle = match stored_bundle {
            Some(bundle) => bundle,
            None => self.acquire_selectors(session, &source).await?,
        };

        self.harvest(session, &source, &bundle).await
    }

    /// Infer a fresh bundle from the listing page and its first resolvable
    /// detail page, then persist it whole.
    async fn acquire_selectors(
        &self,
        session: &mut B,
        source: &SourceRecord,
    ) -> Result<SelectorBundle> {
        tracing::info!(source_id = %source.id, url = %source.url, "Acquiring selectors");
        let base = parse_url(&source.url)?;

        session.navigate(&source.url).await?;
        let listing_html = session.current_html().await?;
        let listing = self
            .inference
            .infer(PageTemplate::Listing, &listing_html)
            .await?;

        let link_selector = listing.link.as_deref().unwrap_or_default();
        let detail_url = detail_links(&listing_html, link_selector, &base)
            .into_iter()
            .next()
            .ok_or(ScrapeError::NoDetailLink)?;

        session.navigate(&detail_url).await?;
        let detail_html = session.current_html().await?;
        let detail = self
            .inference
            .infer(PageTemplate::Detail, &detail_html)
            .await?;

        let bundle = SelectorBundle::build(
            listing,
            detail,
            &detail_html,
            &parse_url(&detail_url)?,
            &self.dates,
        )?;

        self.store
            .upsert_source(&source.url, Some(&bundle), source.wants_ai, source.wants_region)
            .await?;
        // The upsert resets the status; the cycle is still running.
        self.store.set_status(source.id, SourceStatus::Fetching).await?;
        tracing::info!(source_id = %source.id, detail_url = %detail_url, "Selector bundle stored");
        Ok(bundle)
    }

    async fn harvest(
        &self,
        session: &mut B,
        source: &SourceRecord,
        bundle: &SelectorBundle,
    ) -> Result<usize> {
        let base = parse_url(&source.url)?;
        session.navigate(&source.url).await?;

        let listing = bundle.listing();
        let mut pages = PageIterator::for_listing(
            listing.next_page(),
            listing.load_more(),
            self.settings.iterator.clone(),
        );

        let mut stored = 0;
        while let PageStep::Snapshot(html) = pages.next(session).await {
            let listing_url = session.current_url().await?;
            let items = extract_listing(&html, listing, &base);
            tracing::debug!(
                source_id = %source.id,
                page = pages.steps_taken(),
                items = items.len(),
                "Listing snapshot"
            );

            let mut left_listing = false;
            let walk = self
                .process_items(session, source, bundle, items, &mut stored, &mut left_listing)
                .await?;
            if walk == Walk::Stop {
                break;
            }
            if left_listing {
                session.navigate(&listing_url).await?;
            }
        }
        Ok(stored)
    }

    async fn process_items(
        &self,
        session: &mut B,
        source: &SourceRecord,
        bundle: &SelectorBundle,
        items: Vec<ListingItem>,
        stored: &mut usize,
        left_listing: &mut bool,
    ) -> Result<Walk> {
        for item in items {
            if !self
                .relevance
                .admits(&item.title, source.wants_ai, source.wants_region)
            {
                tracing::trace!(title = %item.title, "Not relevant");
                continue;
            }
            let Some(link) = item.link else {
                tracing::debug!(title = %item.title, "Relevant item has no link; skipping");
                continue;
            };

            *left_listing = true;
            session.navigate(&link).await?;
            let detail_html = session.current_html().await?;
            let detail_url = parse_url(&link)?;
            let fields = extract_detail(&detail_html, bundle.detail(), &detail_url);

            if !fields.is_complete() {
                tracing::warn!(
                    source_id = %source.id,
                    url = %link,
                    "Stored selectors no longer read body or post date"
                );
                self.acquire_selectors(session, source).await?;
                return Err(ScrapeError::SelectorDrift {
                    source_id: source.id,
                    reason: format!("body or post date missing on {link}"),
                });
            }

            let raw_date = fields.post_date.as_deref().unwrap_or_default();
            let post_date = *self.dates.normalize(raw_date)?.as_datetime();

            if let Some(floor) = self.settings.freshness_floor {
                if post_date.date_naive() < floor {
                    tracing::info!(url = %link, %post_date, %floor, "Reached articles older than the global floor");
                    return Ok(Walk::Stop);
                }
            }
            if let Some(last) = source.updated_at {
                if post_date < last {
                    tracing::info!(url = %link, %post_date, last_update = %last, "Reached articles seen in an earlier cycle");
                    return Ok(Walk::Stop);
                }
            }

            let event_date = fields
                .event_date
                .as_deref()
                .and_then(|raw| self.dates.normalize(raw).ok())
                .map(|ts| *ts.as_datetime());
            let image_url = fields.image_url.filter(|u| is_well_formed_url(u));

            let author = fields.author.unwrap_or_default();
            let name = author
                .name
                .filter(|n| !n.trim().is_empty() && !self.dates.looks_like_date(n));
            let author_url = author.url.filter(|u| is_well_formed_url(u));
            let author_image = author.image_url.filter(|u| is_well_formed_url(u));
            let author_id = self
                .sink
                .get_or_create_author(name.as_deref(), author_url.as_deref(), author_image.as_deref())
                .await?;

            let body = fields.body.unwrap_or_default();
            let body = self.summarize(&item.title, body).await;

            let article = NewArticle {
                source_id: source.id,
                title: item.title,
                url: link,
                author_id: Some(author_id),
                body,
                post_date,
                event_date,
                image_url,
            };

            match self.sink.add_article(&article).await {
                Ok(IngestOutcome::Inserted(_)) => {
                    *stored += 1;
                    tracing::info!(source_id = %source.id, title = %article.title, "Article stored");
                }
                Ok(IngestOutcome::Merged(_)) => {
                    *stored += 1;
                    tracing::debug!(source_id = %source.id, title = %article.title, "Article merged");
                }
                Err(e) => {
                    tracing::warn!(url = %article.url, error = %e, "Could not store article");
                }
            }
        }
        Ok(Walk::Continue)
    }

    async fn summarize(&self, title: &str, body: String) -> String {
        let Some(summarizer) = &self.summarizer else {
            return body;
        };
        match summarizer.summarize(title, &body).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(title, error = %e, "Summarization failed; keeping full body");
                body
            }
        }
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| ScrapeError::InvalidUrl(format!("{raw}: {e}")))
}
