//! In-memory checkpoint storage for development and testing
//!
//! [`InMemoryCheckpointStore`] keeps every run's history in a `HashMap` behind a
//! tokio `RwLock`. Id assignment and the push happen under the same write guard,
//! so creation order and store order can never diverge. Data is lost when the
//! process exits; use [`SqliteCheckpointStore`](crate::SqliteCheckpointStore) when
//! runs must survive a restart.

use crate::checkpoint::{validate_append, Checkpoint, CheckpointId};
use crate::error::Result;
use crate::traits::CheckpointStore;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Storage {
    next_id: i64,
    runs: HashMap<String, Vec<Checkpoint>>,
}

/// Thread-safe in-memory checkpoint store.
///
/// Cloning is cheap and clones share the same underlying storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    storage: Arc<RwLock<Storage>>,
}

impl InMemoryCheckpointStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of runs with at least one checkpoint
    pub async fn run_count(&self) -> usize {
        self.storage.read().await.runs.len()
    }

    /// Total number of checkpoints across all runs
    pub async fn checkpoint_count(&self) -> usize {
        self.storage
            .read()
            .await
            .runs
            .values()
            .map(|entries| entries.len())
            .sum()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn append(
        &self,
        run_id: &str,
        stage_name: &str,
        state: Value,
        note: &str,
    ) -> Result<Checkpoint> {
        validate_append(run_id, stage_name, &state)?;

        let mut storage = self.storage.write().await;
        storage.next_id += 1;

        let checkpoint = Checkpoint {
            id: CheckpointId(storage.next_id),
            run_id: run_id.to_string(),
            stage_name: stage_name.to_string(),
            timestamp: Utc::now(),
            state_snapshot: state,
            note: note.to_string(),
        };

        storage
            .runs
            .entry(run_id.to_string())
            .or_default()
            .push(checkpoint.clone());

        Ok(checkpoint)
    }

    async fn latest(&self, run_id: &str) -> Result<Option<Checkpoint>> {
        let storage = self.storage.read().await;
        Ok(storage
            .runs
            .get(run_id)
            .and_then(|entries| entries.last().cloned()))
    }

    async fn all(&self, run_id: &str) -> Result<Vec<Checkpoint>> {
        let storage = self.storage.read().await;
        Ok(storage.runs.get(run_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_and_latest() {
        let store = InMemoryCheckpointStore::new();

        let first = store
            .append("run-1", "starter", json!({"status": "running"}), "run started")
            .await
            .unwrap();
        let second = store
            .append("run-1", "Draftsman", json!({"status": "running"}), "Draft created v1")
            .await
            .unwrap();

        assert!(second.id > first.id);

        let latest = store.latest("run-1").await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.stage_name, "Draftsman");
        assert_eq!(latest.note, "Draft created v1");
    }

    #[tokio::test]
    async fn test_unknown_run_is_empty() {
        let store = InMemoryCheckpointStore::new();

        assert!(store.latest("missing").await.unwrap().is_none());
        assert!(store.all("missing").await.unwrap().is_empty());
        assert!(!store.exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let store = InMemoryCheckpointStore::new();

        store.append("a", "starter", json!({}), "a").await.unwrap();
        store.append("b", "starter", json!({}), "b").await.unwrap();
        store.append("a", "Draftsman", json!({}), "a2").await.unwrap();

        let a = store.all("a").await.unwrap();
        let b = store.all("b").await.unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 1);
        assert!(a.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(store.run_count().await, 2);
        assert_eq!(store.checkpoint_count().await, 3);
    }

    #[tokio::test]
    async fn test_rejected_append_writes_nothing() {
        let store = InMemoryCheckpointStore::new();

        let result = store.append("run-1", "starter", json!("not an object"), "bad").await;
        assert!(result.is_err());
        assert_eq!(store.checkpoint_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_appends_across_runs() {
        let store = InMemoryCheckpointStore::new();

        let mut handles = Vec::new();
        for run in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let run_id = format!("run-{}", run);
                for step in 0..10 {
                    store
                        .append(&run_id, "stage", json!({"step": step}), "step")
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.checkpoint_count().await, 80);
        for run in 0..8 {
            let entries = store.all(&format!("run-{}", run)).await.unwrap();
            let steps: Vec<i64> = entries
                .iter()
                .map(|c| c.state_snapshot["step"].as_i64().unwrap())
                .collect();
            assert_eq!(steps, (0..10).collect::<Vec<_>>());
        }
    }
}
