//! Selector bundles.
//!
//! Inference returns loose [`InferredSelectors`] where every slot may be
//! missing. A [`SelectorBundle`] is the validated form and can only be made
//! by [`SelectorBundle::build`], which merges the listing and detail
//! inferences and checks them against a real detail page, or by
//! [`SelectorBundle::from_json`] for a bundle that was validated before it
//! was stored.

use crate::dates::DateNormalizer;
use crate::error::{BundleError, Result, ScrapeError};
use crate::extract::{extract_detail, is_usable_body, is_well_formed_url};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use url::Url;

/// Selector slots as returned by the inference service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferredSelectors {
    pub title: Option<String>,
    pub link: Option<String>,
    #[serde(alias = "next_page", alias = "next")]
    pub next_button: Option<String>,
    #[serde(alias = "load_more")]
    pub load_more_button: Option<String>,
    pub body: Option<String>,
    pub post_date: Option<String>,
    #[serde(alias = "image")]
    pub image_url: Option<String>,
    pub event_date: Option<String>,
    pub author: Option<InferredAuthor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferredAuthor {
    pub name: Option<String>,
    #[serde(alias = "url")]
    pub link: Option<String>,
    #[serde(alias = "image")]
    pub image_url: Option<String>,
}

impl InferredSelectors {
    /// Combine two inferences slot by slot; `self` wins where both have a
    /// value.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        let author = match (self.author, other.author) {
            (Some(a), Some(b)) => Some(InferredAuthor {
                name: a.name.or(b.name),
                link: a.link.or(b.link),
                image_url: a.image_url.or(b.image_url),
            }),
            (a, b) => a.or(b),
        };
        Self {
            title: self.title.or(other.title),
            link: self.link.or(other.link),
            next_button: self.next_button.or(other.next_button),
            load_more_button: self.load_more_button.or(other.load_more_button),
            body: self.body.or(other.body),
            post_date: self.post_date.or(other.post_date),
            image_url: self.image_url.or(other.image_url),
            event_date: self.event_date.or(other.event_date),
            author,
        }
    }
}

/// Selectors applied to a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingSelectors {
    title: String,
    link: String,
    next_page: Option<String>,
    load_more: Option<String>,
}

impl ListingSelectors {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn next_page(&self) -> Option<&str> {
        self.next_page.as_deref()
    }

    pub fn load_more(&self) -> Option<&str> {
        self.load_more.as_deref()
    }
}

/// Selectors applied to an article page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailSelectors {
    body: String,
    post_date: String,
    image: Option<String>,
    event_date: Option<String>,
    author: Option<AuthorSelectors>,
}

impl DetailSelectors {
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn post_date(&self) -> &str {
        &self.post_date
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn event_date(&self) -> Option<&str> {
        self.event_date.as_deref()
    }

    pub fn author(&self) -> Option<&AuthorSelectors> {
        self.author.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSelectors {
    name: String,
    link: Option<String>,
    image: Option<String>,
}

impl AuthorSelectors {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }
}

/// A validated selector bundle. Replaced whole, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorBundle {
    listing: ListingSelectors,
    detail: DetailSelectors,
}

fn is_valid_css(selector: &str) -> bool {
    Selector::parse(selector).is_ok()
}

/// Keep an optional selector only when it is non-blank valid CSS.
fn optional(slot: &'static str, selector: Option<String>) -> Option<String> {
    let selector = selector.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())?;
    if is_valid_css(&selector) {
        Some(selector)
    } else {
        tracing::warn!(slot, selector = %selector, "Dropping unparsable optional selector");
        None
    }
}

fn required(
    slot: &'static str,
    selector: Option<String>,
    missing: BundleError,
) -> std::result::Result<String, BundleError> {
    let selector = selector
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(missing)?;
    if is_valid_css(&selector) {
        Ok(selector)
    } else {
        Err(BundleError::InvalidSelector { slot, selector })
    }
}

impl SelectorBundle {
    /// Merge listing and detail inferences and validate the result against
    /// a rendered detail page.
    ///
    /// Detail slots win over listing slots. Optional selectors that are not
    /// valid CSS, or whose extracted URL is not an absolute http(s) URL,
    /// are nulled. A blank or date-like author name nulls the whole author
    /// group. The bundle is refused when body or post date extract nothing
    /// from `detail_html`.
    pub fn build(
        listing: InferredSelectors,
        detail: InferredSelectors,
        detail_html: &str,
        detail_url: &Url,
        dates: &DateNormalizer,
    ) -> std::result::Result<Self, BundleError> {
        let merged = detail.or(listing);

        let listing = ListingSelectors {
            title: required(
                "title",
                merged.title,
                BundleError::MissingListingSlot { slot: "title" },
            )?,
            link: required(
                "link",
                merged.link,
                BundleError::MissingListingSlot { slot: "link" },
            )?,
            next_page: optional("next_button", merged.next_button),
            load_more: optional("load_more_button", merged.load_more_button),
        };

        let author = merged.author.and_then(|a| {
            let name = optional("author.name", a.name)?;
            Some(AuthorSelectors {
                name,
                link: optional("author.link", a.link),
                image: optional("author.image_url", a.image_url),
            })
        });

        let mut detail = DetailSelectors {
            body: required("body", merged.body, BundleError::MissingBody)?,
            post_date: required("post_date", merged.post_date, BundleError::MissingPostDate)?,
            image: optional("image_url", merged.image_url),
            event_date: optional("event_date", merged.event_date),
            author,
        };

        let fields = extract_detail(detail_html, &detail, detail_url);

        if !fields.body.as_deref().is_some_and(is_usable_body) {
            return Err(BundleError::MissingBody);
        }
        if !fields.post_date.as_deref().is_some_and(|d| !d.trim().is_empty()) {
            return Err(BundleError::MissingPostDate);
        }

        if fields.image_url.as_deref().is_some_and(|u| !is_well_formed_url(u)) {
            tracing::warn!(url = ?fields.image_url, "Image selector yields a malformed URL");
            detail.image = None;
        }

        if let (Some(author), Some(found)) = (detail.author.as_mut(), fields.author.as_ref()) {
            let bad_name = found
                .name
                .as_deref()
                .is_some_and(|n| n.trim().is_empty() || dates.looks_like_date(n));
            if bad_name {
                tracing::warn!(name = ?found.name, "Author selector yields no usable name");
                detail.author = None;
            } else {
                if found.url.as_deref().is_some_and(|u| !is_well_formed_url(u)) {
                    tracing::warn!(url = ?found.url, "Author link selector yields a malformed URL");
                    author.link = None;
                }
                if found.image_url.as_deref().is_some_and(|u| !is_well_formed_url(u)) {
                    tracing::warn!(url = ?found.image_url, "Author image selector yields a malformed URL");
                    author.image = None;
                }
            }
        }

        Ok(Self { listing, detail })
    }

    /// Restore a previously persisted bundle.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let bundle: Self = serde_json::from_value(value.clone())
            .map_err(|e| ScrapeError::MalformedBundle(e.to_string()))?;
        for (slot, selector) in [
            ("title", bundle.listing.title.as_str()),
            ("link", bundle.listing.link.as_str()),
            ("body", bundle.detail.body.as_str()),
            ("post_date", bundle.detail.post_date.as_str()),
        ] {
            if !is_valid_css(selector) {
                return Err(BundleError::InvalidSelector {
                    slot,
                    selector: selector.to_string(),
                }
                .into());
            }
        }
        Ok(bundle)
    }

    pub fn to_json(&self) -> serde_json::Value {
        // Plain strings and options only; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn listing(&self) -> &ListingSelectors {
        &self.listing
    }

    pub fn detail(&self) -> &DetailSelectors {
        &self.detail
    }
}
