//! Storage contract for run checkpoints
//!
//! This module defines **[`CheckpointStore`]**, the only persistence interface the
//! pipeline depends on. Implementations must honour three rules:
//!
//! - **Append-only** - a checkpoint is never mutated or deleted once written
//! - **Atomic append** - a failed append leaves no visible partial record
//! - **Ordered ids** - ids grow with creation order, across all runs
//!
//! Concurrent appends for *different* runs must be safe. Concurrent writers for the
//! *same* run are not expected: the orchestrator drives each run from a single
//! logical caller at a time.
//!
//! # Implementing a Backend
//!
//! ```rust,ignore
//! use foundry_checkpoint::{Checkpoint, CheckpointStore, Result};
//! use async_trait::async_trait;
//! use serde_json::Value;
//!
//! struct PostgresStore { pool: sqlx::PgPool }
//!
//! #[async_trait]
//! impl CheckpointStore for PostgresStore {
//!     async fn append(&self, run_id: &str, stage_name: &str, state: Value, note: &str)
//!         -> Result<Checkpoint>
//!     {
//!         // INSERT ... RETURNING id, timestamp
//!     }
//!
//!     async fn latest(&self, run_id: &str) -> Result<Option<Checkpoint>> {
//!         // SELECT ... WHERE run_id = $1 ORDER BY id DESC LIMIT 1
//!     }
//!
//!     async fn all(&self, run_id: &str) -> Result<Vec<Checkpoint>> {
//!         // SELECT ... WHERE run_id = $1 ORDER BY id ASC
//!     }
//! }
//! ```

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Append-only checkpoint log keyed by run id.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Record a new checkpoint for `run_id`.
    ///
    /// The store assigns `id` and `timestamp`. Either the whole record becomes
    /// visible or nothing does.
    async fn append(
        &self,
        run_id: &str,
        stage_name: &str,
        state: Value,
        note: &str,
    ) -> Result<Checkpoint>;

    /// The checkpoint with the greatest id for `run_id`, if any.
    async fn latest(&self, run_id: &str) -> Result<Option<Checkpoint>>;

    /// Every checkpoint for `run_id`, ascending by id. Empty for unknown runs.
    async fn all(&self, run_id: &str) -> Result<Vec<Checkpoint>>;

    /// Whether any checkpoint exists for `run_id`.
    async fn exists(&self, run_id: &str) -> Result<bool> {
        Ok(self.latest(run_id).await?.is_some())
    }
}
