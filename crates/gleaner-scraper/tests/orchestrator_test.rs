use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use gleaner_browser::session::SCROLL_HEIGHT_SCRIPT;
use gleaner_browser::{BrowserError, BrowserSession, IteratorConfig};
use gleaner_core::{PageTemplate, SourceId, SourceStatus, StatisticsConfig};
use gleaner_db::{articles, statistics, Database, SourceRecord};
use gleaner_llm::LlmError;
use gleaner_scraper::{
    DateNormalizer, InferenceError, InferredSelectors, Orchestrator, OrchestratorSettings,
    RefreshOutcome, RelevancePolicy, ScrapeError, SelectorBundle, SelectorInference, SourceStore, Summarizer,
    TriggerSet,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

const LISTING: &str = "https://news.example.com/";
const PAGE_TWO: &str = "https://news.example.com/page/2";

#[derive(Default)]
struct SiteState {
    pages: HashMap<String, String>,
    next: HashMap<String, String>,
    current: String,
    navigations: Vec<String>,
    files: HashMap<String, Vec<u8>>,
    downloads: Vec<String>,
}

/// A scripted website. Clones share state so a test can inspect and
/// change the site after the session moved into the orchestrator.
#[derive(Clone, Default)]
struct FakeSite(Arc<Mutex<SiteState>>);

impl FakeSite {
    fn page(&self, url: &str, html: impl Into<String>) -> &Self {
        self.0.lock().unwrap().pages.insert(url.to_string(), html.into());
        self
    }

    fn link_next(&self, from: &str, to: &str) -> &Self {
        self.0.lock().unwrap().next.insert(from.to_string(), to.to_string());
        self
    }

    fn file(&self, url: &str, data: &[u8]) -> &Self {
        self.0.lock().unwrap().files.insert(url.to_string(), data.to_vec());
        self
    }

    fn downloads(&self) -> Vec<String> {
        self.0.lock().unwrap().downloads.clone()
    }

    fn navigations(&self) -> Vec<String> {
        self.0.lock().unwrap().navigations.clone()
    }

    fn article_visits(&self) -> Vec<String> {
        self.navigations()
            .into_iter()
            .filter(|u| u.contains("/articles/"))
            .collect()
    }

    fn follow_next(&self, selector: &str) -> gleaner_browser::Result<()> {
        let mut state = self.0.lock().unwrap();
        match state.next.get(&state.current).cloned() {
            Some(next) => {
                state.current = next;
                Ok(())
            }
            None => Err(BrowserError::SelectorNotFound(selector.to_string())),
        }
    }
}

#[async_trait]
impl BrowserSession for FakeSite {
    async fn navigate(&mut self, url: &str) -> gleaner_browser::Result<()> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let mut state = self.0.lock().unwrap();
        if !state.pages.contains_key(url) {
            return Err(BrowserError::NavigationError(format!("404 {url}")));
        }
        state.current = url.to_string();
        state.navigations.push(url.to_string());
        Ok(())
    }

    async fn current_html(&mut self) -> gleaner_browser::Result<String> {
        let state = self.0.lock().unwrap();
        state
            .pages
            .get(&state.current)
            .cloned()
            .ok_or_else(|| BrowserError::NavigationError("blank page".to_string()))
    }

    async fn current_url(&mut self) -> gleaner_browser::Result<String> {
        Ok(self.0.lock().unwrap().current.clone())
    }

    async fn execute_script(&mut self, script: &str) -> gleaner_browser::Result<serde_json::Value> {
        if script == SCROLL_HEIGHT_SCRIPT {
            Ok(json!(1000))
        } else {
            Ok(serde_json::Value::Null)
        }
    }

    async fn element_exists(&mut self, _selector: &str) -> gleaner_browser::Result<bool> {
        let state = self.0.lock().unwrap();
        Ok(state.next.contains_key(&state.current))
    }

    async fn wait_for_clickable(&mut self, selector: &str, _timeout: Duration) -> gleaner_browser::Result<()> {
        let state = self.0.lock().unwrap();
        if state.next.contains_key(&state.current) {
            Ok(())
        } else {
            Err(BrowserError::Timeout(selector.to_string()))
        }
    }

    async fn scroll_into_view(&mut self, _selector: &str) -> gleaner_browser::Result<()> {
        Ok(())
    }

    async fn script_click(&mut self, selector: &str) -> gleaner_browser::Result<()> {
        self.follow_next(selector)
    }

    async fn pointer_click(&mut self, selector: &str) -> gleaner_browser::Result<()> {
        self.follow_next(selector)
    }

    async fn download(&mut self, url: &str) -> gleaner_browser::Result<Vec<u8>> {
        let mut state = self.0.lock().unwrap();
        state.downloads.push(url.to_string());
        state.files.get(url).cloned().ok_or_else(|| BrowserError::DownloadError {
            url: url.to_string(),
            reason: "status 404".to_string(),
        })
    }
}

/// Replies with canned selectors and counts calls per page kind. A `None`
/// reply fails the call.
#[derive(Default)]
struct FakeInference {
    listing: Mutex<Option<InferredSelectors>>,
    detail: Mutex<Option<InferredSelectors>>,
    listing_calls: AtomicUsize,
    detail_calls: AtomicUsize,
}

impl FakeInference {
    fn new(listing: InferredSelectors, detail: InferredSelectors) -> Self {
        Self {
            listing: Mutex::new(Some(listing)),
            detail: Mutex::new(Some(detail)),
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self::default()
    }

    fn calls(&self) -> (usize, usize) {
        (
            self.listing_calls.load(Ordering::SeqCst),
            self.detail_calls.load(Ordering::SeqCst),
        )
    }
}

#[async_trait]
impl SelectorInference for FakeInference {
    async fn infer(&self, template: PageTemplate, _html: &str) -> Result<InferredSelectors, InferenceError> {
        let reply = match template {
            PageTemplate::Listing => {
                self.listing_calls.fetch_add(1, Ordering::SeqCst);
                self.listing.lock().unwrap().clone()
            }
            PageTemplate::Detail => {
                self.detail_calls.fetch_add(1, Ordering::SeqCst);
                self.detail.lock().unwrap().clone()
            }
        };
        reply.ok_or(InferenceError::NoCodeBlock)
    }
}

struct FakeSummarizer {
    fail: bool,
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, title: &str, _body: &str) -> Result<String, LlmError> {
        if self.fail {
            Err(LlmError::EmptyResponse {
                provider: "fake".to_string(),
            })
        } else {
            Ok(format!("Summary of {title}"))
        }
    }
}

/// Delegates to the database and records the status each attempt reads.
struct StatusLog {
    db: Database,
    seen: Mutex<Vec<SourceStatus>>,
}

impl StatusLog {
    fn seen(&self) -> Vec<SourceStatus> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceStore for StatusLog {
    async fn upsert_source(
        &self,
        url: &str,
        bundle: Option<&SelectorBundle>,
        wants_ai: bool,
        wants_region: bool,
    ) -> gleaner_scraper::Result<SourceId> {
        self.db.upsert_source(url, bundle, wants_ai, wants_region).await
    }

    async fn list_sources(&self) -> gleaner_scraper::Result<Vec<SourceRecord>> {
        self.db.list_sources().await
    }

    async fn get_source(&self, id: SourceId) -> gleaner_scraper::Result<SourceRecord> {
        let source = self.db.get_source(id).await?;
        self.seen.lock().unwrap().push(source.status);
        Ok(source)
    }

    async fn set_status(&self, id: SourceId, status: SourceStatus) -> gleaner_scraper::Result<()> {
        self.db.set_status(id, status).await
    }

    async fn touch_updated_at(&self, id: SourceId, at: DateTime<Utc>) -> gleaner_scraper::Result<()> {
        self.db.touch_updated_at(id, at).await
    }
}

fn listing_selectors() -> InferredSelectors {
    InferredSelectors {
        title: Some("h2.title".into()),
        link: Some("h2.title a".into()),
        ..Default::default()
    }
}

fn detail_selectors(body: &str) -> InferredSelectors {
    InferredSelectors {
        body: Some(body.into()),
        post_date: Some("time.published".into()),
        ..Default::default()
    }
}

fn listing_html(items: &[(&str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(slug, title)| {
            format!(r#"<li><h2 class="title"><a href="/articles/{slug}">{title}</a></h2></li>"#)
        })
        .collect();
    format!("<html><body><ul>{items}</ul></body></html>")
}

fn detail_html(body_class: &str, text: &str, date: &str) -> String {
    format!(
        r#"<html><body><article>
            <time class="published">{date}</time>
            <div class="{body_class}"><p>{text}</p></div>
        </article></body></html>"#
    )
}

fn article_url(slug: &str) -> String {
    format!("https://news.example.com/articles/{slug}")
}

/// Three listed articles, two of them about AI.
fn news_site() -> FakeSite {
    let site = FakeSite::default();
    site.page(
        LISTING,
        listing_html(&[
            ("ai-chips", "New AI chips unveiled"),
            ("football", "Football season opens"),
            ("robotics", "Robotics startups raise funds"),
        ]),
    )
    .page(&article_url("ai-chips"), detail_html("content", "Chips body.", "2024-03-05"))
    .page(&article_url("football"), detail_html("content", "Match body.", "2024-03-04"))
    .page(&article_url("robotics"), detail_html("content", "Robot body.", "2024-03-01"));
    site
}

fn relevance() -> Arc<RelevancePolicy> {
    Arc::new(RelevancePolicy::new(
        TriggerSet::new(["AI", "robotics"], ["machine learning"]),
        TriggerSet::new(["Africa"], ["sub-saharan"]),
    ))
}

fn settings(max_attempts: u32) -> OrchestratorSettings {
    OrchestratorSettings {
        max_attempts,
        iterator: IteratorConfig {
            max_steps: 10,
            control_timeout: Duration::ZERO,
            settle_delay: Duration::ZERO,
            scroll_poll_interval: Duration::ZERO,
            max_scroll_polls: 3,
        },
        freshness_floor: None,
    }
}

async fn setup_test_db() -> Database {
    let db = Database::new(":memory:").await.expect("create test database");
    db.run_migrations().await.expect("run migrations");
    db
}

fn orchestrator(
    site: &FakeSite,
    db: &Database,
    inference: &Arc<FakeInference>,
    max_attempts: u32,
) -> Orchestrator<FakeSite> {
    Orchestrator::new(
        site.clone(),
        Arc::new(db.clone()),
        Arc::new(db.clone()),
        inference.clone(),
        relevance(),
    )
    .with_settings(settings(max_attempts))
}

/// Store a ready bundle for the listing so no inference is needed. `body`
/// is the class of the article body container.
async fn seed_bundle(db: &Database, listing: InferredSelectors, body: &str) -> SourceId {
    let bundle = SelectorBundle::build(
        listing,
        detail_selectors(&format!(".{body}")),
        &detail_html(body, "Seed body.", "2024-01-01"),
        &Url::parse(&article_url("seed")).unwrap(),
        &DateNormalizer::new(),
    )
    .expect("valid bundle");
    SourceStore::upsert_source(db, LISTING, Some(&bundle), true, false)
        .await
        .expect("seed source")
}

#[tokio::test]
async fn test_only_relevant_articles_are_visited() {
    let db = setup_test_db().await;
    let site = news_site();
    let inference = Arc::new(FakeInference::failing());
    let id = seed_bundle(&db, listing_selectors(), "content").await;

    let report = orchestrator(&site, &db, &inference, 3).run_cycle().await.unwrap();

    assert_eq!(site.article_visits(), vec![article_url("ai-chips"), article_url("robotics")]);
    assert_eq!(inference.calls(), (0, 0));

    let outcome = &report.sources[0];
    assert_eq!(outcome.source_id, id);
    assert_eq!(outcome.articles_stored, 2);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.status, SourceStatus::Available);

    let stored = articles::list_articles(db.pool(), id, 10).await.unwrap();
    let titles: Vec<_> = stored.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["New AI chips unveiled", "Robotics startups raise funds"]);
    assert_eq!(stored[0].body, "Chips body.");

    let source = SourceStore::get_source(&db, id).await.unwrap();
    assert_eq!(source.status, SourceStatus::Available);
    assert!(source.updated_at.is_some());
}

#[tokio::test]
async fn test_first_cycle_acquires_selectors() {
    let db = setup_test_db().await;
    let site = news_site();
    let inference = Arc::new(FakeInference::new(listing_selectors(), detail_selectors(".content")));
    let orchestrator = orchestrator(&site, &db, &inference, 3);

    let id = orchestrator.register_source(LISTING, true, false).await.unwrap();
    assert!(SourceStore::get_source(&db, id).await.unwrap().selectors.is_none());

    let report = orchestrator.run_cycle().await.unwrap();
    assert_eq!(inference.calls(), (1, 1));
    assert_eq!(report.articles_stored(), 2);

    // Acquisition inspects the first listed article, relevant or not
    assert_eq!(site.navigations()[..2], [LISTING.to_string(), article_url("ai-chips")]);

    let stored = SourceStore::get_source(&db, id).await.unwrap();
    let bundle = SelectorBundle::from_json(stored.selectors.as_ref().unwrap()).unwrap();
    assert_eq!(bundle.detail().body(), ".content");
    assert_eq!(bundle.listing().title(), "h2.title");
}

#[tokio::test]
async fn test_drift_regenerates_once_then_retries() {
    let db = setup_test_db().await;
    let site = news_site();
    // The site moved its article body to a new container
    for (slug, text, date) in [
        ("ai-chips", "Chips body.", "2024-03-05"),
        ("robotics", "Robot body.", "2024-03-01"),
    ] {
        site.page(&article_url(slug), detail_html("article-body", text, date));
    }
    let id = seed_bundle(&db, listing_selectors(), "content").await;
    let inference = Arc::new(FakeInference::new(listing_selectors(), detail_selectors(".article-body")));

    let report = orchestrator(&site, &db, &inference, 3).run_cycle().await.unwrap();

    assert_eq!(inference.calls(), (1, 1));
    let outcome = &report.sources[0];
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.status, SourceStatus::Available);
    assert_eq!(outcome.articles_stored, 2);

    let source = SourceStore::get_source(&db, id).await.unwrap();
    let bundle = SelectorBundle::from_json(source.selectors.as_ref().unwrap()).unwrap();
    assert_eq!(bundle.detail().body(), ".article-body");
}

#[tokio::test]
async fn test_drift_with_single_attempt_marks_unavailable() {
    let db = setup_test_db().await;
    let site = news_site();
    site.page(&article_url("ai-chips"), detail_html("article-body", "Chips body.", "2024-03-05"));
    let id = seed_bundle(&db, listing_selectors(), "content").await;
    let inference = Arc::new(FakeInference::new(listing_selectors(), detail_selectors(".article-body")));

    let report = orchestrator(&site, &db, &inference, 1).run_cycle().await.unwrap();

    let outcome = &report.sources[0];
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.status, SourceStatus::Unavailable);
    assert!(outcome.last_error.as_deref().unwrap().contains("drifted"));
    assert_eq!(inference.calls(), (1, 1));

    // The regenerated bundle stays stored even though the source is set aside
    let source = SourceStore::get_source(&db, id).await.unwrap();
    assert_eq!(source.status, SourceStatus::Unavailable);
    let bundle = SelectorBundle::from_json(source.selectors.as_ref().unwrap()).unwrap();
    assert_eq!(bundle.detail().body(), ".article-body");
}

#[tokio::test]
async fn test_source_stays_fetching_across_regeneration() {
    let db = setup_test_db().await;
    let site = news_site();
    site.page(&article_url("ai-chips"), detail_html("article-body", "Chips body.", "2024-03-05"))
        .page(&article_url("robotics"), detail_html("article-body", "Robot body.", "2024-03-01"));
    let id = seed_bundle(&db, listing_selectors(), "content").await;
    let inference = Arc::new(FakeInference::new(listing_selectors(), detail_selectors(".article-body")));
    let store = Arc::new(StatusLog {
        db: db.clone(),
        seen: Mutex::new(Vec::new()),
    });

    let report = Orchestrator::new(site.clone(), store.clone(), Arc::new(db.clone()), inference.clone(), relevance())
        .with_settings(settings(3))
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.sources[0].attempts, 2);
    assert_eq!(store.seen(), vec![SourceStatus::Fetching, SourceStatus::Fetching]);
    assert_eq!(
        SourceStore::get_source(&db, id).await.unwrap().status,
        SourceStatus::Available
    );
}

#[tokio::test]
async fn test_article_mentioning_cookies_is_stored() {
    let db = setup_test_db().await;
    let site = news_site();
    site.page(
        &article_url("ai-chips"),
        detail_html("content", "The AI plan to phase out third-party cookies.", "2024-03-05"),
    );
    let id = seed_bundle(&db, listing_selectors(), "content").await;
    let inference = Arc::new(FakeInference::failing());

    let report = orchestrator(&site, &db, &inference, 3).run_cycle().await.unwrap();

    let outcome = &report.sources[0];
    assert_eq!(outcome.status, SourceStatus::Available);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.articles_stored, 2);
    assert_eq!(inference.calls(), (0, 0));

    let stored = articles::list_articles(db.pool(), id, 10).await.unwrap();
    assert_eq!(stored[0].body, "The AI plan to phase out third-party cookies.");
}

#[tokio::test]
async fn test_relevant_item_without_http_link_is_skipped() {
    let db = setup_test_db().await;
    let site = news_site();
    site.page(
        LISTING,
        r#"<html><body><ul>
            <li><h2 class="title"><a href="javascript:void(0)">AI newsletter signup</a></h2></li>
            <li><h2 class="title"><a href="/articles/ai-chips">New AI chips unveiled</a></h2></li>
        </ul></body></html>"#,
    );
    let id = seed_bundle(&db, listing_selectors(), "content").await;
    let inference = Arc::new(FakeInference::failing());

    let report = orchestrator(&site, &db, &inference, 3).run_cycle().await.unwrap();

    let outcome = &report.sources[0];
    assert_eq!(outcome.status, SourceStatus::Available);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(site.article_visits(), vec![article_url("ai-chips")]);
    assert_eq!(articles::count_articles(db.pool()).await.unwrap(), 1);
    assert_eq!(
        SourceStore::get_source(&db, id).await.unwrap().status,
        SourceStatus::Available
    );
}

#[tokio::test]
async fn test_failing_source_is_set_aside() {
    let db = setup_test_db().await;
    let site = news_site();
    let inference = Arc::new(FakeInference::failing());
    let orchestrator = orchestrator(&site, &db, &inference, 3);
    let id = orchestrator.register_source(LISTING, true, false).await.unwrap();

    let report = orchestrator.run_cycle().await.unwrap();
    let outcome = &report.sources[0];
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.status, SourceStatus::Unavailable);
    assert_eq!(report.failed(), 1);
    assert_eq!(inference.calls(), (3, 0));

    let report = orchestrator.run_cycle().await.unwrap();
    assert_eq!(report.sources[0].attempts, 0);
    assert_eq!(inference.calls(), (3, 0));
    assert_eq!(
        SourceStore::get_source(&db, id).await.unwrap().status,
        SourceStatus::Unavailable
    );
}

#[tokio::test]
async fn test_reregistering_resets_source() {
    let db = setup_test_db().await;
    let site = news_site();
    let inference = Arc::new(FakeInference::failing());
    let orchestrator = orchestrator(&site, &db, &inference, 1);

    let id = seed_bundle(&db, listing_selectors(), "content").await;
    SourceStore::set_status(&db, id, SourceStatus::Unavailable).await.unwrap();

    let again = orchestrator.register_source(LISTING, false, true).await.unwrap();
    assert_eq!(again, id);

    let sources = SourceStore::list_sources(&db).await.unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].status, SourceStatus::Available);
    assert!(sources[0].selectors.is_none());
    assert!(!sources[0].wants_ai);
    assert!(sources[0].wants_region);
}

#[tokio::test]
async fn test_register_rejects_bad_url() {
    let db = setup_test_db().await;
    let inference = Arc::new(FakeInference::failing());
    let orchestrator = orchestrator(&FakeSite::default(), &db, &inference, 1);

    let err = orchestrator.register_source("ftp://example.com", true, false).await;
    assert!(matches!(err, Err(ScrapeError::InvalidUrl(_))));
    assert!(SourceStore::list_sources(&db).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_freshness_floor_stops_walk() {
    let db = setup_test_db().await;
    let site = news_site();
    let inference = Arc::new(FakeInference::failing());
    let id = seed_bundle(&db, listing_selectors(), "content").await;

    let mut settings = settings(3);
    settings.freshness_floor = NaiveDate::from_ymd_opt(2024, 3, 3);
    let orchestrator = orchestrator(&site, &db, &inference, 3).with_settings(settings);

    let report = orchestrator.run_cycle().await.unwrap();
    assert_eq!(report.sources[0].status, SourceStatus::Available);
    assert_eq!(report.sources[0].articles_stored, 1);

    let stored = articles::list_articles(db.pool(), id, 10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].url, article_url("ai-chips"));
}

#[tokio::test]
async fn test_second_cycle_stops_at_seen_articles() {
    let db = setup_test_db().await;
    let site = news_site();
    let inference = Arc::new(FakeInference::failing());
    seed_bundle(&db, listing_selectors(), "content").await;
    let orchestrator = orchestrator(&site, &db, &inference, 3);

    assert_eq!(orchestrator.run_cycle().await.unwrap().articles_stored(), 2);

    let report = orchestrator.run_cycle().await.unwrap();
    assert_eq!(report.sources[0].status, SourceStatus::Available);
    assert_eq!(report.articles_stored(), 0);
    assert_eq!(articles::count_articles(db.pool()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_overlapping_cycle_is_rejected() {
    let db = setup_test_db().await;
    let site = news_site();
    let inference = Arc::new(FakeInference::failing());
    seed_bundle(&db, listing_selectors(), "content").await;
    let orchestrator = orchestrator(&site, &db, &inference, 3);

    let (first, second) = tokio::join!(orchestrator.run_cycle(), orchestrator.run_cycle());
    assert!(first.is_ok());
    assert!(matches!(second, Err(ScrapeError::CycleInProgress)));
}

#[tokio::test]
async fn test_summaries_replace_body() {
    let db = setup_test_db().await;
    let site = news_site();
    let inference = Arc::new(FakeInference::failing());
    let id = seed_bundle(&db, listing_selectors(), "content").await;

    orchestrator(&site, &db, &inference, 3)
        .with_summarizer(Arc::new(FakeSummarizer { fail: false }))
        .run_cycle()
        .await
        .unwrap();

    let stored = articles::list_articles(db.pool(), id, 10).await.unwrap();
    assert_eq!(stored[0].body, "Summary of New AI chips unveiled");
}

#[tokio::test]
async fn test_failed_summary_keeps_body() {
    let db = setup_test_db().await;
    let site = news_site();
    let inference = Arc::new(FakeInference::failing());
    let id = seed_bundle(&db, listing_selectors(), "content").await;

    let report = orchestrator(&site, &db, &inference, 3)
        .with_summarizer(Arc::new(FakeSummarizer { fail: true }))
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.articles_stored(), 2);
    let stored = articles::list_articles(db.pool(), id, 10).await.unwrap();
    assert_eq!(stored[0].body, "Chips body.");
}

#[tokio::test]
async fn test_pagination_returns_to_listing_page() {
    let db = setup_test_db().await;
    let site = FakeSite::default();
    site.page(LISTING, listing_html(&[("ai-chips", "New AI chips unveiled")]))
        .page(PAGE_TWO, listing_html(&[("robotics", "Robotics startups raise funds")]))
        .page(&article_url("ai-chips"), detail_html("content", "Chips body.", "2024-03-05"))
        .page(&article_url("robotics"), detail_html("content", "Robot body.", "2024-03-01"))
        .link_next(LISTING, PAGE_TWO);

    let paginated = InferredSelectors {
        next_button: Some("a.next".into()),
        ..listing_selectors()
    };
    seed_bundle(&db, paginated, "content").await;
    let inference = Arc::new(FakeInference::failing());

    let report = orchestrator(&site, &db, &inference, 3).run_cycle().await.unwrap();
    assert_eq!(report.articles_stored(), 2);
    assert_eq!(
        site.navigations(),
        vec![
            LISTING.to_string(),
            article_url("ai-chips"),
            LISTING.to_string(),
            article_url("robotics"),
            PAGE_TWO.to_string(),
        ]
    );
}

#[tokio::test]
async fn test_scrape_single_source() {
    let db = setup_test_db().await;
    let site = news_site();
    let inference = Arc::new(FakeInference::failing());
    let id = seed_bundle(&db, listing_selectors(), "content").await;
    SourceStore::set_status(&db, id, SourceStatus::Unavailable).await.unwrap();

    let outcome = orchestrator(&site, &db, &inference, 3)
        .scrape_source(id)
        .await
        .unwrap();
    assert_eq!(outcome.status, SourceStatus::Available);
    assert_eq!(outcome.articles_stored, 2);
}

const STATS_PAGE: &str = "https://stats.example.org/datamapper";
const STATS_FILE: &str = "https://stats.example.org/files/index.xlsx";

fn stats_config() -> StatisticsConfig {
    StatisticsConfig {
        enabled: true,
        name: "Preparedness".to_string(),
        page_url: STATS_PAGE.to_string(),
        link_selector: "a.export".to_string(),
        max_age_days: 3,
    }
}

#[tokio::test]
async fn test_statistics_downloaded_once_while_fresh() {
    let db = setup_test_db().await;
    let site = FakeSite::default();
    site.page(
        STATS_PAGE,
        r#"<html><body><a class="export" href="/files/index.xlsx">Excel</a></body></html>"#,
    )
    .file(STATS_FILE, b"PK\x03\x04workbook");
    let inference = Arc::new(FakeInference::failing());
    let orchestrator = orchestrator(&site, &db, &inference, 1)
        .with_statistics(stats_config(), Arc::new(db.clone()));

    let first = orchestrator.refresh_statistics().await.unwrap();
    assert_eq!(
        first,
        Some(RefreshOutcome::Stored {
            url: STATS_FILE.to_string(),
            bytes: 12,
        })
    );
    let stored = statistics::get_statistics(db.pool(), "Preparedness")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.data, b"PK\x03\x04workbook");
    assert_eq!(stored.source_url, STATS_FILE);

    let second = orchestrator.refresh_statistics().await.unwrap();
    assert!(matches!(second, Some(RefreshOutcome::Fresh { .. })));
    assert_eq!(site.downloads(), vec![STATS_FILE.to_string()]);
}

#[tokio::test]
async fn test_statistics_missing_link() {
    let db = setup_test_db().await;
    let site = FakeSite::default();
    site.page(STATS_PAGE, "<html><body><p>Maintenance</p></body></html>");
    let inference = Arc::new(FakeInference::failing());
    let orchestrator = orchestrator(&site, &db, &inference, 1)
        .with_statistics(stats_config(), Arc::new(db.clone()));

    assert_eq!(
        orchestrator.refresh_statistics().await.unwrap(),
        Some(RefreshOutcome::NoDownloadLink)
    );
    assert!(site.downloads().is_empty());
    assert!(statistics::get_statistics(db.pool(), "Preparedness").await.unwrap().is_none());
}

#[tokio::test]
async fn test_statistics_failure_does_not_block_cycle() {
    let db = setup_test_db().await;
    let site = news_site();
    let inference = Arc::new(FakeInference::failing());
    seed_bundle(&db, listing_selectors(), "content").await;
    // The statistics page is not served at all
    let orchestrator = orchestrator(&site, &db, &inference, 3)
        .with_statistics(stats_config(), Arc::new(db.clone()));

    let report = orchestrator.run_cycle().await.unwrap();
    assert_eq!(report.articles_stored(), 2);
    assert!(site.downloads().is_empty());
}

#[tokio::test]
async fn test_statistics_not_configured() {
    let db = setup_test_db().await;
    let inference = Arc::new(FakeInference::failing());
    let orchestrator = orchestrator(&FakeSite::default(), &db, &inference, 1);
    assert_eq!(orchestrator.refresh_statistics().await.unwrap(), None);
}
