//! Downloaded statistics datasets, stored whole and keyed by name.

use crate::error::Result;
use crate::sources::parse_time;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

/// A stored dataset snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsRecord {
    /// Row id
    pub id: i64,
    /// Dataset name; unique
    pub name: String,
    /// Where the file was downloaded from
    pub source_url: String,
    /// Raw downloaded bytes
    pub data: Vec<u8>,
    /// When the snapshot was last replaced
    pub updated_at: DateTime<Utc>,
}

/// Insert or replace the snapshot named `name`, returning its id.
pub async fn upsert_statistics(
    pool: &SqlitePool,
    name: &str,
    source_url: &str,
    data: &[u8],
    at: DateTime<Utc>,
) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO statistics (name, source_url, data, updated_at)
         VALUES (?, ?, ?, ?)
         ON CONFLICT(name) DO UPDATE SET
             source_url = excluded.source_url,
             data = excluded.data,
             updated_at = excluded.updated_at
         RETURNING id",
    )
    .bind(name)
    .bind(source_url)
    .bind(data)
    .bind(at.to_rfc3339())
    .fetch_one(pool)
    .await?;

    tracing::debug!(statistics_id = id, name, bytes = data.len(), "Statistics snapshot stored");
    Ok(id)
}

/// When the snapshot named `name` was last replaced, if it exists.
pub async fn get_updated_at(pool: &SqlitePool, name: &str) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> =
        sqlx::query_scalar("SELECT updated_at FROM statistics WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;
    raw.as_deref().map(parse_time).transpose()
}

/// Fetch the snapshot named `name`.
pub async fn get_statistics(pool: &SqlitePool, name: &str) -> Result<Option<StatisticsRecord>> {
    let row = sqlx::query(
        "SELECT id, name, source_url, data, updated_at FROM statistics WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let updated_at: String = row.try_get("updated_at")?;
    Ok(Some(StatisticsRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        source_url: row.try_get("source_url")?,
        data: row.try_get("data")?,
        updated_at: parse_time(&updated_at)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use chrono::Duration;

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("create test database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    #[tokio::test]
    async fn test_snapshot_replaced_by_name() {
        let db = setup_test_db().await;
        let pool = db.pool();
        assert!(get_updated_at(pool, "index").await.unwrap().is_none());

        let first = Utc::now() - Duration::days(5);
        let id = upsert_statistics(pool, "index", "https://example.org/a.xlsx", b"old", first)
            .await
            .unwrap();

        let second = Utc::now();
        let again = upsert_statistics(pool, "index", "https://example.org/b.xlsx", b"new", second)
            .await
            .unwrap();
        assert_eq!(id, again);

        let stored = get_statistics(pool, "index").await.unwrap().unwrap();
        assert_eq!(stored.data, b"new");
        assert_eq!(stored.source_url, "https://example.org/b.xlsx");
        assert_eq!(
            get_updated_at(pool, "index").await.unwrap().map(|t| t.timestamp()),
            Some(second.timestamp())
        );
        assert!(get_statistics(pool, "other").await.unwrap().is_none());
    }
}
