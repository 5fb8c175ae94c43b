//! # foundry-checkpoint - Append-Only Run History
//!
//! **Checkpoint model and storage backends** for foundry pipeline runs. Every stage
//! execution, every failure, and every human approval is recorded as an immutable
//! [`Checkpoint`]. A run has no storage of its own: it *is* the ordered set of its
//! checkpoints.
//!
//! ## Overview
//!
//! Checkpoints are written once and never updated in place. Corrections are new
//! checkpoints carrying an explanatory note. This gives:
//!
//! - **Deterministic Resumption** - the latest checkpoint decides where a run continues
//! - **Human-in-the-Loop** - approval is just another checkpoint on the same run
//! - **Audit Trail** - the full history of a run survives process restarts
//! - **Change Detection** - observers compare checkpoint ids to detect progress
//!
//! ## Core Concepts
//!
//! ### CheckpointStore Trait
//!
//! The [`CheckpointStore`] trait is the narrow contract the executor and the
//! progress feed consume:
//!
//! - **`append()`** - atomically record a new snapshot, assigning `id` and `timestamp`
//! - **`latest()`** - the checkpoint with the greatest id for a run
//! - **`all()`** - every checkpoint for a run, ascending by id
//!
//! ### Checkpoint Ids
//!
//! [`CheckpointId`] is a monotonically increasing integer. Creation order equals
//! store order, so "newest" is always "largest id".
//!
//! ## Quick Start
//!
//! ```rust
//! use foundry_checkpoint::{CheckpointStore, InMemoryCheckpointStore};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> foundry_checkpoint::Result<()> {
//! let store = InMemoryCheckpointStore::new();
//!
//! store.append("run-1", "starter", json!({"status": "running"}), "run started").await?;
//! store.append("run-1", "Draftsman", json!({"status": "running"}), "Draft created v1").await?;
//!
//! let latest = store.latest("run-1").await?.expect("run exists");
//! assert_eq!(latest.stage_name, "Draftsman");
//! assert_eq!(store.all("run-1").await?.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! - [`InMemoryCheckpointStore`] - tests and single-process experiments
//! - [`SqliteCheckpointStore`] - durable storage via `sqlx`, survives restarts

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use checkpoint::{Checkpoint, CheckpointId};
pub use error::{CheckpointError, Result};
pub use memory::InMemoryCheckpointStore;
pub use sqlite::{Database, SqliteCheckpointStore};
pub use traits::CheckpointStore;
