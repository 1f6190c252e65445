//! Article authors, deduplicated by name.

use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Name stored when an article carries no author name.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// A stored author.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuthorRecord {
    /// Row id
    pub id: i64,
    /// Display name; unique
    pub name: String,
    /// Profile page
    pub url: Option<String>,
    /// Avatar image
    pub image_url: Option<String>,
}

/// Return the id of the author with this name, creating it when missing.
///
/// A blank or missing name maps to [`UNKNOWN_AUTHOR`]. Profile and image
/// URLs only fill fields that are still empty.
pub async fn get_or_create_author(
    pool: &SqlitePool,
    name: Option<&str>,
    url: Option<&str>,
    image_url: Option<&str>,
) -> Result<i64> {
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(UNKNOWN_AUTHOR);

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO authors (name, url, image_url, created_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(name) DO UPDATE SET
             url = COALESCE(authors.url, excluded.url),
             image_url = COALESCE(authors.image_url, excluded.image_url)
         RETURNING id",
    )
    .bind(name)
    .bind(url)
    .bind(image_url)
    .bind(Utc::now().to_rfc3339())
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Fetch an author by id.
pub async fn get_author(pool: &SqlitePool, id: i64) -> Result<Option<AuthorRecord>> {
    let author = sqlx::query_as::<_, AuthorRecord>(
        "SELECT id, name, url, image_url FROM authors WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(author)
}
