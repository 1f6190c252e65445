//! Source registry: listing URLs, their selector bundle and lifecycle status.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use gleaner_core::{SourceId, SourceStatus};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// A registered source as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Row id
    pub id: SourceId,
    /// Listing page URL
    pub url: String,
    /// Serialized selector bundle; `None` until acquired
    pub selectors: Option<serde_json::Value>,
    /// Source only yields AI-related articles when matched
    pub wants_ai: bool,
    /// Source only yields region-related articles when matched
    pub wants_region: bool,
    /// Lifecycle status
    pub status: SourceStatus,
    /// When the source was first registered
    pub created_at: DateTime<Utc>,
    /// Last successful scrape
    pub updated_at: Option<DateTime<Utc>>,
}

/// Whole-record write for a source.
#[derive(Debug, Clone)]
pub struct SourceUpsert<'a> {
    /// Listing page URL; the upsert key
    pub url: &'a str,
    /// New selector bundle, or `None` to clear it
    pub selectors: Option<&'a serde_json::Value>,
    /// AI gate flag
    pub wants_ai: bool,
    /// Region gate flag
    pub wants_region: bool,
}

pub(crate) fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("bad timestamp '{raw}': {e}")))
}

fn row_to_source(row: &SqliteRow) -> Result<SourceRecord> {
    let selectors = row
        .try_get::<Option<String>, _>("selectors")?
        .map(|raw| serde_json::from_str(&raw))
        .transpose()
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

    let status: String = row.try_get("status")?;
    let status = status
        .parse::<SourceStatus>()
        .map_err(|e| DatabaseError::Decode(e.to_string()))?;

    let created_at: String = row.try_get("created_at")?;
    let updated_at: Option<String> = row.try_get("updated_at")?;

    Ok(SourceRecord {
        id: SourceId::new(row.try_get("id")?),
        url: row.try_get("url")?,
        selectors,
        wants_ai: row.try_get("wants_ai")?,
        wants_region: row.try_get("wants_region")?,
        status,
        created_at: parse_time(&created_at)?,
        updated_at: updated_at.as_deref().map(parse_time).transpose()?,
    })
}

/// Insert or replace a source keyed by URL, returning its id.
///
/// The selector bundle, both flags and the status are replaced together.
/// Any write with a bundle, and any write without one (a fresh
/// registration awaiting acquisition), leaves the source `available`.
pub async fn upsert_source(pool: &SqlitePool, source: &SourceUpsert<'_>) -> Result<SourceId> {
    let selectors = source
        .selectors
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO sources (url, selectors, wants_ai, wants_region, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(url) DO UPDATE SET
             selectors = excluded.selectors,
             wants_ai = excluded.wants_ai,
             wants_region = excluded.wants_region,
             status = excluded.status
         RETURNING id",
    )
    .bind(source.url)
    .bind(selectors)
    .bind(source.wants_ai)
    .bind(source.wants_region)
    .bind(SourceStatus::Available.as_str())
    .bind(Utc::now().to_rfc3339())
    .fetch_one(pool)
    .await?;

    tracing::debug!(
        source_id = id,
        url = source.url,
        has_selectors = source.selectors.is_some(),
        "Source upserted"
    );
    Ok(SourceId::new(id))
}

/// All sources in registration order.
pub async fn list_sources(pool: &SqlitePool) -> Result<Vec<SourceRecord>> {
    let rows = sqlx::query(
        "SELECT id, url, selectors, wants_ai, wants_region, status, created_at, updated_at
         FROM sources ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_source).collect()
}

/// Fetch one source.
pub async fn get_source(pool: &SqlitePool, id: SourceId) -> Result<SourceRecord> {
    let row = sqlx::query(
        "SELECT id, url, selectors, wants_ai, wants_region, status, created_at, updated_at
         FROM sources WHERE id = ?",
    )
    .bind(id.get())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFoundWithMessage(format!("source {id} not found")))?;

    row_to_source(&row)
}

/// Set the lifecycle status of a source.
pub async fn set_status(pool: &SqlitePool, id: SourceId, status: SourceStatus) -> Result<()> {
    let result = sqlx::query("UPDATE sources SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id.get())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundWithMessage(format!(
            "source {id} not found"
        )));
    }
    Ok(())
}

/// Record the time of the last successful scrape.
pub async fn touch_updated_at(pool: &SqlitePool, id: SourceId, at: DateTime<Utc>) -> Result<()> {
    let result = sqlx::query("UPDATE sources SET updated_at = ? WHERE id = ?")
        .bind(at.to_rfc3339())
        .bind(id.get())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundWithMessage(format!(
            "source {id} not found"
        )));
    }
    Ok(())
}
