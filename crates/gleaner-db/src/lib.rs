//! Gleaner Database Layer
//!
//! Provides `SQLite` persistence for the harvesting engine: the source
//! registry with its selector bundles and lifecycle status, harvested
//! articles and their authors, and downloaded statistics datasets. Uses
//! `SQLx` with embedded migrations.
//!
//! # Example
//!
//! ```ignore
//! use gleaner_db::Database;
//!
//! let db = Database::new("gleaner.db").await?;
//! db.run_migrations().await?;
//! ```
//!
//! # Design Principles
//!
//! - Selector bundles are stored as one JSON column and only ever replaced whole
//! - Source writes are upserts keyed by URL; the last writer wins
//! - Article ingestion is idempotent by URL

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod articles;
pub mod authors;
pub mod connection;
pub mod error;
pub mod migrations;
pub mod sources;
pub mod statistics;

// Re-export commonly used types
pub use articles::{ArticleRecord, IngestOutcome, NewArticle};
pub use authors::{AuthorRecord, UNKNOWN_AUTHOR};
pub use error::{DatabaseError, Result};
pub use sources::{SourceRecord, SourceUpsert};
pub use statistics::StatisticsRecord;

use std::path::Path;

/// High-level database interface.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: sqlx::SqlitePool,
}

impl Database {
    /// Open the database at `path` (or `:memory:`) with the default pool size.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_max_connections(path, 5).await
    }

    /// Open the database with an explicit pool size.
    pub async fn with_max_connections(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let pool = connection::connect(path, max_connections).await?;
        Ok(Self { pool })
    }

    /// Open the database described by configuration and bring its schema up
    /// to date.
    pub async fn open(config: &gleaner_core::AppConfig) -> Result<Self> {
        let path = config
            .database_path()
            .map_err(|e| DatabaseError::Open(e.to_string()))?;
        let db = Self::with_max_connections(path, config.database.max_connections).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Run all pending database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the number of applied migrations.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    /// Close the connection pool gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_creation() {
        let db = Database::new(":memory:").await.expect("create database");
        db.run_migrations().await.expect("run migrations");
        assert_eq!(db.get_schema_version().await.expect("version"), 2);
        db.close().await;
    }

    #[tokio::test]
    async fn test_open_from_config() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let mut config = gleaner_core::AppConfig::default();
        config.database.path = Some(tmp.path().join("gleaner.db"));

        let db = Database::open(&config).await.expect("open database");
        assert_eq!(db.get_schema_version().await.expect("version"), 2);
        assert!(tmp.path().join("gleaner.db").exists());
    }
}
