//! Harvested articles.
//!
//! Ingestion is idempotent: an article whose URL, or whose title within the
//! same source, is already stored is merged into the existing row instead of
//! inserted again.

use crate::error::Result;
use chrono::{DateTime, Utc};
use gleaner_core::SourceId;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// An article ready to be stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewArticle {
    /// Source that listed the article
    pub source_id: SourceId,
    /// Listing title
    pub title: String,
    /// Canonical detail page URL
    pub url: String,
    /// Author row, if one was extracted
    pub author_id: Option<i64>,
    /// Article body (possibly summarized)
    pub body: String,
    /// Normalized publication time
    pub post_date: DateTime<Utc>,
    /// Normalized event time, for event announcements
    pub event_date: Option<DateTime<Utc>>,
    /// Lead image
    pub image_url: Option<String>,
}

/// A stored article.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ArticleRecord {
    /// Row id
    pub id: i64,
    /// Source row id
    pub source_id: i64,
    /// Author row id
    pub author_id: Option<i64>,
    /// Listing title
    pub title: String,
    /// Canonical URL
    pub url: String,
    /// Body text
    pub body: String,
    /// RFC 3339 publication time
    pub post_date: String,
    /// RFC 3339 event time
    pub event_date: Option<String>,
    /// Lead image
    pub image_url: Option<String>,
}

/// What happened to an ingested article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new row was created
    Inserted(i64),
    /// An existing row absorbed the article
    Merged(i64),
}

impl IngestOutcome {
    /// Row id of the stored article.
    #[must_use]
    pub fn id(self) -> i64 {
        match self {
            Self::Inserted(id) | Self::Merged(id) => id,
        }
    }
}

/// Store an article, merging into an existing row with the same URL or the
/// same title from the same source.
///
/// Merging refreshes the body and fills image, author and event date when
/// they were missing.
pub async fn add_article(pool: &SqlitePool, article: &NewArticle) -> Result<IngestOutcome> {
    let mut tx = pool.begin().await?;

    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM articles
         WHERE url = ? OR (source_id = ? AND title = ?)
         ORDER BY id ASC LIMIT 1",
    )
    .bind(&article.url)
    .bind(article.source_id.get())
    .bind(&article.title)
    .fetch_optional(&mut *tx)
    .await?;

    let outcome = if let Some(id) = existing {
        sqlx::query(
            "UPDATE articles SET
                 body = ?,
                 image_url = COALESCE(image_url, ?),
                 author_id = COALESCE(author_id, ?),
                 event_date = COALESCE(event_date, ?)
             WHERE id = ?",
        )
        .bind(&article.body)
        .bind(&article.image_url)
        .bind(article.author_id)
        .bind(article.event_date.map(|d| d.to_rfc3339()))
        .bind(id)
        .execute(&mut *tx)
        .await?;
        IngestOutcome::Merged(id)
    } else {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO articles
                 (source_id, author_id, title, url, body, post_date, event_date, image_url, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(article.source_id.get())
        .bind(article.author_id)
        .bind(&article.title)
        .bind(&article.url)
        .bind(&article.body)
        .bind(article.post_date.to_rfc3339())
        .bind(article.event_date.map(|d| d.to_rfc3339()))
        .bind(&article.image_url)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *tx)
        .await?;
        IngestOutcome::Inserted(id)
    };

    tx.commit().await?;

    tracing::debug!(
        source_id = %article.source_id,
        url = %article.url,
        outcome = ?outcome,
        "Article stored"
    );
    Ok(outcome)
}

/// Articles of one source, newest first.
pub async fn list_articles(
    pool: &SqlitePool,
    source_id: SourceId,
    limit: u32,
) -> Result<Vec<ArticleRecord>> {
    let articles = sqlx::query_as::<_, ArticleRecord>(
        "SELECT id, source_id, author_id, title, url, body, post_date, event_date, image_url
         FROM articles WHERE source_id = ?
         ORDER BY post_date DESC LIMIT ?",
    )
    .bind(source_id.get())
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    Ok(articles)
}

/// Total stored articles.
pub async fn count_articles(pool: &SqlitePool) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
