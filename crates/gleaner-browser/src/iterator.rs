//! Lazy, bounded walks over a listing view.
//!
//! Iterators hold only their own progress; the session is lent to each
//! [`PageIterator::next`] call so callers can visit detail pages between
//! steps. Consuming a step moves the real browser forward and cannot be
//! undone, so an iterator is never restarted.

use crate::error::{BrowserError, Result};
use crate::session::BrowserSession;
use gleaner_core::ScrapingConfig;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Outcome of advancing a page iterator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStep {
    /// Rendered HTML for the next step
    Snapshot(String),
    /// No further content; a normal end of iteration
    Exhausted,
}

/// Timing and bound settings shared by both strategies.
#[derive(Debug, Clone)]
pub struct IteratorConfig {
    /// Maximum snapshots yielded
    pub max_steps: usize,
    /// How long to wait for a navigation control to become clickable
    pub control_timeout: Duration,
    /// Pause after clicking a control
    pub settle_delay: Duration,
    /// Pause between scroll-height samples
    pub scroll_poll_interval: Duration,
    /// Upper bound on scroll-height samples while forcing a full render
    pub max_scroll_polls: u32,
}

impl Default for IteratorConfig {
    fn default() -> Self {
        Self::from(&ScrapingConfig::default())
    }
}

impl From<&ScrapingConfig> for IteratorConfig {
    fn from(config: &ScrapingConfig) -> Self {
        Self {
            max_steps: config.max_pages,
            control_timeout: Duration::from_millis(config.control_timeout_ms),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            scroll_poll_interval: Duration::from_millis(config.scroll_poll_interval_ms),
            max_scroll_polls: config.max_scroll_polls,
        }
    }
}

/// Either listing strategy behind one contract.
#[derive(Debug)]
pub enum PageIterator {
    /// Follows a "next page" control
    Paginated(PaginatedIterator),
    /// Scrolls or presses "load more"
    InfiniteScroll(InfiniteScrollIterator),
}

impl PageIterator {
    /// Pick the strategy for a listing: a next-page control means
    /// pagination, anything else is treated as infinite scroll.
    pub fn for_listing(
        next_page: Option<&str>,
        load_more: Option<&str>,
        config: IteratorConfig,
    ) -> Self {
        match next_page {
            Some(selector) => Self::Paginated(PaginatedIterator::new(selector, config)),
            None => Self::InfiniteScroll(InfiniteScrollIterator::new(load_more, config)),
        }
    }

    /// Advance to the next snapshot.
    pub async fn next<S>(&mut self, session: &mut S) -> PageStep
    where
        S: BrowserSession + ?Sized,
    {
        match self {
            Self::Paginated(it) => it.next(session).await,
            Self::InfiniteScroll(it) => it.next(session).await,
        }
    }

    /// Snapshots yielded so far.
    pub fn steps_taken(&self) -> usize {
        match self {
            Self::Paginated(it) => it.steps_taken,
            Self::InfiniteScroll(it) => it.steps_taken,
        }
    }
}

/// Scroll until the document height stops changing, bounded by
/// `max_scroll_polls`.
async fn scroll_until_stable<S>(session: &mut S, config: &IteratorConfig) -> Result<()>
where
    S: BrowserSession + ?Sized,
{
    let mut last_height = session.scroll_height().await?;
    for _ in 0..config.max_scroll_polls {
        session.scroll_to_bottom().await?;
        tokio::time::sleep(config.scroll_poll_interval).await;
        let height = session.scroll_height().await?;
        if height == last_height {
            return Ok(());
        }
        last_height = height;
    }
    tracing::debug!(
        polls = config.max_scroll_polls,
        "Page kept growing; continuing without a stable height"
    );
    Ok(())
}

/// Wait for the control, bring it into view and click it, falling back to a
/// pointer click when the scripted click is rejected.
async fn press_control<S>(session: &mut S, selector: &str, config: &IteratorConfig) -> Result<()>
where
    S: BrowserSession + ?Sized,
{
    session
        .wait_for_clickable(selector, config.control_timeout)
        .await?;
    session.scroll_into_view(selector).await?;

    if let Err(e) = session.script_click(selector).await {
        tracing::debug!(%selector, "Scripted click failed ({}), using pointer click", e);
        session.pointer_click(selector).await?;
    }

    tokio::time::sleep(config.settle_delay).await;
    Ok(())
}

fn digest(html: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    html.hash(&mut hasher);
    hasher.finish()
}

/// Follows a "next page" control.
///
/// The first step is the page as currently rendered. Each later step forces
/// a full render, clicks the control and snapshots the result. A missing or
/// unclickable control, or a click that leaves the page unchanged, ends the
/// walk.
#[derive(Debug)]
pub struct PaginatedIterator {
    next_selector: String,
    config: IteratorConfig,
    steps_taken: usize,
    last_digest: Option<u64>,
    exhausted: bool,
}

impl PaginatedIterator {
    pub fn new(next_selector: impl Into<String>, config: IteratorConfig) -> Self {
        Self {
            next_selector: next_selector.into(),
            config,
            steps_taken: 0,
            last_digest: None,
            exhausted: false,
        }
    }

    pub async fn next<S>(&mut self, session: &mut S) -> PageStep
    where
        S: BrowserSession + ?Sized,
    {
        if self.exhausted || self.steps_taken >= self.config.max_steps {
            return self.finish();
        }

        if self.steps_taken > 0 {
            tracing::debug!(page = self.steps_taken + 1, "Navigating to next page");
            if let Err(e) = self.advance(session).await {
                tracing::info!(selector = %self.next_selector, "Pagination ended: {}", e);
                return self.finish();
            }
        }

        let html = match session.current_html().await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Could not snapshot page: {}", e);
                return self.finish();
            }
        };

        let current = digest(&html);
        if self.last_digest == Some(current) {
            tracing::info!("Next page control did not change the page; stopping");
            return self.finish();
        }

        self.last_digest = Some(current);
        self.steps_taken += 1;
        PageStep::Snapshot(html)
    }

    async fn advance<S>(&mut self, session: &mut S) -> Result<()>
    where
        S: BrowserSession + ?Sized,
    {
        scroll_until_stable(session, &self.config).await?;
        press_control(session, &self.next_selector, &self.config).await
    }

    fn finish(&mut self) -> PageStep {
        self.exhausted = true;
        PageStep::Exhausted
    }
}

/// Scrolls the listing, pressing a "load more" control when one exists.
///
/// The first step is the full page. With a control, later steps yield only
/// the markup appended since the previous step; without one, they yield the
/// whole grown page, and an unchanged height ends the walk.
#[derive(Debug)]
pub struct InfiniteScrollIterator {
    load_more: Option<String>,
    config: IteratorConfig,
    steps_taken: usize,
    consumed_len: usize,
    exhausted: bool,
}

impl InfiniteScrollIterator {
    pub fn new(load_more: Option<&str>, config: IteratorConfig) -> Self {
        Self {
            load_more: load_more
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            config,
            steps_taken: 0,
            consumed_len: 0,
            exhausted: false,
        }
    }

    pub async fn next<S>(&mut self, session: &mut S) -> PageStep
    where
        S: BrowserSession + ?Sized,
    {
        if self.exhausted || self.steps_taken >= self.config.max_steps {
            return self.finish();
        }

        let step = if self.steps_taken == 0 {
            self.first(session).await
        } else {
            self.load(session).await
        };

        match step {
            Ok(Some(html)) => {
                self.steps_taken += 1;
                PageStep::Snapshot(html)
            }
            Ok(None) => self.finish(),
            Err(e) => {
                tracing::warn!("Infinite scroll ended on error: {}", e);
                self.finish()
            }
        }
    }

    async fn first<S>(&mut self, session: &mut S) -> Result<Option<String>>
    where
        S: BrowserSession + ?Sized,
    {
        // A configured control the page does not have is ignored
        if let Some(selector) = self.load_more.clone() {
            if !session.element_exists(&selector).await? {
                tracing::debug!(%selector, "Load-more control absent; scrolling only");
                self.load_more = None;
            }
        }

        let html = session.current_html().await?;
        self.consumed_len = html.len();
        Ok(Some(html))
    }

    async fn load<S>(&mut self, session: &mut S) -> Result<Option<String>>
    where
        S: BrowserSession + ?Sized,
    {
        let last_height = session.scroll_height().await?;
        session.scroll_to_bottom().await?;
        tokio::time::sleep(self.config.scroll_poll_interval).await;
        let height = session.scroll_height().await?;

        match self.load_more.clone() {
            Some(selector) => {
                match press_control(session, &selector, &self.config).await {
                    Ok(()) => {}
                    Err(BrowserError::Timeout(_) | BrowserError::SelectorNotFound(_)) => {
                        tracing::debug!("No more load-more control found");
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                }
                let html = session.current_html().await?;
                let delta = trailing_delta(&html, self.consumed_len);
                self.consumed_len = html.len();
                Ok((!delta.is_empty()).then(|| delta.to_string()))
            }
            None if height > last_height => {
                let html = session.current_html().await?;
                self.consumed_len = html.len();
                Ok(Some(html))
            }
            None => Ok(None),
        }
    }

    fn finish(&mut self) -> PageStep {
        self.exhausted = true;
        PageStep::Exhausted
    }
}

/// The part of `html` past the first `consumed` bytes, moved forward to the
/// next character boundary.
fn trailing_delta(html: &str, consumed: usize) -> &str {
    let mut start = consumed.min(html.len());
    while !html.is_char_boundary(start) {
        start += 1;
    }
    &html[start..]
}
