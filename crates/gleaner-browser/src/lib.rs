//! Browser automation for listing and article pages.
//!
//! Provides an exclusively owned [`BrowserSession`] abstraction, a
//! chromium-backed implementation and the lazy page iterators that walk
//! paginated and infinite-scroll listings.

pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod iterator;
pub mod session;

pub use engine::BrowserEngine;
pub use error::{BrowserError, Result};
pub use iterator::{
    InfiniteScrollIterator, IteratorConfig, PageIterator, PageStep, PaginatedIterator,
};
pub use session::{extract_domain, BrowserSession};
