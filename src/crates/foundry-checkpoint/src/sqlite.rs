//! SQLite-backed checkpoint storage
//!
//! Provides the [`Database`] connection wrapper and [`SqliteCheckpointStore`], the
//! durable [`CheckpointStore`] used outside of tests. Each append is a single
//! `INSERT`, so it is atomic; `INTEGER PRIMARY KEY AUTOINCREMENT` gives ids that
//! grow with creation order and are never reused.

use crate::checkpoint::{validate_append, Checkpoint, CheckpointId};
use crate::error::{CheckpointError, Result};
use crate::traits::CheckpointStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Type alias for the database connection pool
pub type DatabasePool = SqlitePool;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS run_checkpoints (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id         TEXT    NOT NULL,
    stage_name     TEXT    NOT NULL,
    timestamp_ms   INTEGER NOT NULL,
    state_snapshot TEXT    NOT NULL,
    note           TEXT    NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_run_checkpoints_run ON run_checkpoints (run_id, id);
";

/// Database connection wrapper
#[derive(Clone, Debug)]
pub struct Database {
    pool: Arc<DatabasePool>,
}

impl Database {
    /// Open (creating if needed) the SQLite database at `database_path`.
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        Self::with_max_connections(database_path, 5).await
    }

    /// Open the database with a custom pool size.
    pub async fn with_max_connections<P: AsRef<Path>>(
        database_path: P,
        max_connections: u32,
    ) -> Result<Self> {
        let path = database_path.as_ref();
        let path_str = path
            .to_str()
            .ok_or_else(|| CheckpointError::Storage("Invalid database path".to_string()))?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let database_url = format!("sqlite:{}", path_str);
        debug!(url = %database_url, "Connecting to database");

        let options = SqliteConnectOptions::from_str(&database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        info!(path = %path.display(), "Database connection established");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Private in-memory database.
    ///
    /// Pinned to a single connection that never idles out, since every SQLite
    /// memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Create the checkpoint table and index if they do not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(self.pool()).await?;
        }
        debug!("Checkpoint schema ready");
        Ok(())
    }

    /// Perform a health check by running a simple query
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(self.pool()).await?;
        Ok(())
    }

    /// Close the database connection
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connection closed");
    }
}

/// Durable [`CheckpointStore`] on top of SQLite.
#[derive(Clone, Debug)]
pub struct SqliteCheckpointStore {
    db: Arc<Database>,
}

impl SqliteCheckpointStore {
    /// Wrap an open database, creating the schema if needed.
    pub async fn new(db: Arc<Database>) -> Result<Self> {
        db.ensure_schema().await?;
        Ok(Self { db })
    }

    /// Open the database file at `path` and prepare it for checkpoints.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Database::new(path).await?;
        Self::new(Arc::new(db)).await
    }

    /// Get the underlying database
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    fn row_to_checkpoint(row: &SqliteRow) -> Result<Checkpoint> {
        let timestamp_ms: i64 = row.get("timestamp_ms");
        let timestamp = DateTime::<Utc>::from_timestamp_millis(timestamp_ms).ok_or_else(|| {
            CheckpointError::Storage(format!("Invalid checkpoint timestamp: {}", timestamp_ms))
        })?;
        let snapshot: String = row.get("state_snapshot");

        Ok(Checkpoint {
            id: CheckpointId(row.get("id")),
            run_id: row.get("run_id"),
            stage_name: row.get("stage_name"),
            timestamp,
            state_snapshot: serde_json::from_str(&snapshot)?,
            note: row.get("note"),
        })
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn append(
        &self,
        run_id: &str,
        stage_name: &str,
        state: Value,
        note: &str,
    ) -> Result<Checkpoint> {
        validate_append(run_id, stage_name, &state)?;

        let encoded = serde_json::to_string(&state)?;
        let now = Utc::now();
        let timestamp_ms = now.timestamp_millis();

        let result = sqlx::query(
            "INSERT INTO run_checkpoints (run_id, stage_name, timestamp_ms, state_snapshot, note)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(run_id)
        .bind(stage_name)
        .bind(timestamp_ms)
        .bind(&encoded)
        .bind(note)
        .execute(self.db.pool())
        .await?;

        let id = CheckpointId(result.last_insert_rowid());
        debug!(run_id, stage = stage_name, checkpoint_id = %id, "Checkpoint appended");

        Ok(Checkpoint {
            id,
            run_id: run_id.to_string(),
            stage_name: stage_name.to_string(),
            timestamp: DateTime::<Utc>::from_timestamp_millis(timestamp_ms).unwrap_or(now),
            state_snapshot: state,
            note: note.to_string(),
        })
    }

    async fn latest(&self, run_id: &str) -> Result<Option<Checkpoint>> {
        let row = sqlx::query(
            "SELECT id, run_id, stage_name, timestamp_ms, state_snapshot, note
             FROM run_checkpoints
             WHERE run_id = ?
             ORDER BY id DESC
             LIMIT 1",
        )
        .bind(run_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(Self::row_to_checkpoint).transpose()
    }

    async fn all(&self, run_id: &str) -> Result<Vec<Checkpoint>> {
        let rows = sqlx::query(
            "SELECT id, run_id, stage_name, timestamp_ms, state_snapshot, note
             FROM run_checkpoints
             WHERE run_id = ?
             ORDER BY id ASC",
        )
        .bind(run_id)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(Self::row_to_checkpoint).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn memory_store() -> SqliteCheckpointStore {
        let db = Database::in_memory().await.unwrap();
        SqliteCheckpointStore::new(Arc::new(db)).await.unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let db = Database::in_memory().await.unwrap();
        assert!(db.health_check().await.is_ok());
        db.close().await;
    }

    #[tokio::test]
    async fn test_append_latest_all() {
        let store = memory_store().await;

        let a = store
            .append("run-1", "starter", json!({"status": "running"}), "run started")
            .await
            .unwrap();
        let b = store
            .append("run-1", "Draftsman", json!({"status": "running", "iteration_count": 1}), "Draft created v1")
            .await
            .unwrap();
        store
            .append("run-2", "starter", json!({"status": "running"}), "run started")
            .await
            .unwrap();

        assert!(b.id > a.id);

        let latest = store.latest("run-1").await.unwrap().unwrap();
        assert_eq!(latest, b);

        let all = store.all("run-1").await.unwrap();
        assert_eq!(all, vec![a, b]);
    }

    #[tokio::test]
    async fn test_unknown_run() {
        let store = memory_store().await;
        assert!(store.latest("nope").await.unwrap().is_none());
        assert!(store.all("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_snapshot_rejected() {
        let store = memory_store().await;
        assert!(store.append("run-1", "starter", json!(3), "bad").await.is_err());
        assert!(store.all("run-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("foundry.db");

        {
            let store = SqliteCheckpointStore::open(&path).await.unwrap();
            store
                .append("run-1", "starter", json!({"status": "running"}), "run started")
                .await
                .unwrap();
            store.database().close().await;
        }

        let reopened = SqliteCheckpointStore::open(&path).await.unwrap();
        let latest = reopened.latest("run-1").await.unwrap().unwrap();
        assert_eq!(latest.stage_name, "starter");
        assert_eq!(latest.state_snapshot["status"], "running");
    }
}
