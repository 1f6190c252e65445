//! Applies selector bundles to rendered HTML.

use crate::selectors::{DetailSelectors, ListingSelectors};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

/// Attributes that may carry a URL, in lookup order.
const URL_ATTRIBUTES: &[&str] = &["href", "src", "data-src", "content"];

/// One title/link pair from a listing snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingItem {
    pub title: String,
    /// Absolute detail URL, when the link element had one
    pub link: Option<String>,
}

/// Raw fields read from a detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailFields {
    pub body: Option<String>,
    pub post_date: Option<String>,
    pub image_url: Option<String>,
    pub event_date: Option<String>,
    pub author: Option<AuthorFields>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorFields {
    pub name: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
}

impl DetailFields {
    /// Body and post date are both present and non-blank.
    pub fn is_complete(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.body) && present(&self.post_date)
    }
}

/// A body that is empty or mentions cookies is treated as a consent wall,
/// not an article. Only consulted when a fresh bundle is validated.
pub fn is_usable_body(body: &str) -> bool {
    let body = body.trim();
    !body.is_empty() && !body.contains("cookies")
}

/// Whether `url` is an absolute http(s) URL with a host.
pub fn is_well_formed_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}

/// Resolve `href` against `base`, returning it unchanged when it cannot
/// be joined.
pub fn resolve_url(base: &Url, href: &str) -> String {
    let href = href.trim();
    base.join(href)
        .map_or_else(|_| href.to_string(), |u| u.to_string())
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            tracing::debug!(selector, error = %e, "Unparsable selector");
            None
        }
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    let raw: String = element.text().collect();
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn element_url(element: &ElementRef<'_>, base: &Url) -> Option<String> {
    URL_ATTRIBUTES
        .iter()
        .find_map(|attr| element.value().attr(attr))
        .filter(|v| !v.trim().is_empty())
        .map(|href| resolve_url(base, href))
}

/// Text of the first element matching `selector`.
pub fn select_text(document: &Html, selector: &str) -> Option<String> {
    let sel = parse_selector(selector)?;
    document.select(&sel).next().map(|el| element_text(&el))
}

/// Absolute URL carried by the first element matching `selector`.
///
/// Looks at `href`, then `src`, `data-src` and `content` (for `<meta>`
/// tags). When the matched element has none of those, its first
/// descendant that does is used instead.
pub fn select_url(document: &Html, selector: &str, base: &Url) -> Option<String> {
    let sel = parse_selector(selector)?;
    let element = document.select(&sel).next()?;
    element_url(&element, base).or_else(|| {
        element
            .descendants()
            .filter_map(ElementRef::wrap)
            .find_map(|child| element_url(&child, base))
    })
}

/// Title/link pairs of a listing snapshot in document order.
///
/// Titles and links are paired by position; titles past the end of the
/// link list, or whose link is not an absolute http(s) URL, carry no link.
pub fn extract_listing(html: &str, selectors: &ListingSelectors, base: &Url) -> Vec<ListingItem> {
    let document = Html::parse_document(html);
    let (Some(title_sel), Some(link_sel)) = (
        parse_selector(selectors.title()),
        parse_selector(selectors.link()),
    ) else {
        return Vec::new();
    };

    let links: Vec<Option<String>> = document
        .select(&link_sel)
        .map(|el| element_url(&el, base).filter(|u| is_well_formed_url(u)))
        .collect();

    document
        .select(&title_sel)
        .enumerate()
        .map(|(i, el)| ListingItem {
            title: element_text(&el),
            link: links.get(i).cloned().flatten(),
        })
        .filter(|item| !item.title.is_empty())
        .collect()
}

/// Well-formed absolute URLs of every element matching `link_selector`,
/// in document order.
pub fn detail_links(html: &str, link_selector: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let Some(sel) = parse_selector(link_selector) else {
        return Vec::new();
    };
    document
        .select(&sel)
        .filter_map(|el| element_url(&el, base))
        .filter(|u| is_well_formed_url(u))
        .collect()
}

/// Read every detail field the bundle names.
pub fn extract_detail(html: &str, selectors: &DetailSelectors, base: &Url) -> DetailFields {
    let document = Html::parse_document(html);
    let text = |sel: Option<&str>| sel.and_then(|s| select_text(&document, s));
    let url = |sel: Option<&str>| sel.and_then(|s| select_url(&document, s, base));

    DetailFields {
        body: text(Some(selectors.body())),
        post_date: text(Some(selectors.post_date())),
        image_url: url(selectors.image()),
        event_date: text(selectors.event_date()),
        author: selectors.author().map(|author| AuthorFields {
            name: text(Some(author.name())),
            url: url(author.link()),
            image_url: url(author.image()),
        }),
    }
}
