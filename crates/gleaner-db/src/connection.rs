//! Connection pool setup.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Open a `SQLite` pool at `path` (or `:memory:`), creating the file and its
/// parent directory when missing.
///
/// Foreign keys are enforced and file databases use WAL journaling.
pub async fn connect(path: impl AsRef<Path>, max_connections: u32) -> Result<Pool<Sqlite>> {
    let path = path.as_ref();
    let path_str = path
        .to_str()
        .ok_or_else(|| DatabaseError::Open("invalid database path: not valid UTF-8".to_string()))?;
    let in_memory = path_str == ":memory:";

    if !in_memory {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut connect_options = SqliteConnectOptions::from_str(path_str)
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5))
        .create_if_missing(true);
    if !in_memory {
        connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
    }

    // An in-memory database lives only as long as one of its connections
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .min_connections(u32::from(in_memory))
        .idle_timeout(if in_memory { None } else { Some(Duration::from_secs(600)) })
        .connect_with(connect_options)
        .await
        .map_err(|e| DatabaseError::Open(format!("failed to open pool: {e}")))?;

    tracing::info!("Database pool opened at {}", path_str);
    Ok(pool)
}
