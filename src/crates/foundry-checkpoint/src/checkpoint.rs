//! Core checkpoint data structures
//!
//! A [`Checkpoint`] is an immutable record `{id, run_id, stage_name, timestamp,
//! state_snapshot, note}`. The snapshot is kept as a JSON tree so this crate stays
//! independent of the state type threaded through the pipeline; callers decode it
//! with [`Checkpoint::state`].

use crate::error::{CheckpointError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Monotonically increasing checkpoint identifier.
///
/// Ids are assigned by the store at append time; a larger id always means a
/// later write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointId(pub i64);

impl CheckpointId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable snapshot of a run's state after one stage, failure, or external event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Store-assigned id, unique across all runs
    pub id: CheckpointId,

    /// Run this checkpoint belongs to
    pub run_id: String,

    /// Stage (or external actor such as `human`) that produced the snapshot
    pub stage_name: String,

    /// Wall-clock time of the append
    pub timestamp: DateTime<Utc>,

    /// Full state at this point, always a JSON object
    pub state_snapshot: Value,

    /// Human-readable description of what happened
    pub note: String,
}

impl Checkpoint {
    /// Decode the snapshot into a typed state.
    pub fn state<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.state_snapshot.clone())?)
    }
}

/// Shared precondition for every backend's `append`.
pub(crate) fn validate_append(run_id: &str, stage_name: &str, state: &Value) -> Result<()> {
    if run_id.trim().is_empty() {
        return Err(CheckpointError::Invalid("run_id must not be empty".to_string()));
    }
    if stage_name.trim().is_empty() {
        return Err(CheckpointError::Invalid(
            "stage_name must not be empty".to_string(),
        ));
    }
    if !state.is_object() {
        return Err(CheckpointError::Invalid(
            "state snapshot must be a JSON object".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Probe {
        status: String,
        iteration_count: u32,
    }

    #[test]
    fn test_decode_state() {
        let cp = Checkpoint {
            id: CheckpointId(7),
            run_id: "run-1".to_string(),
            stage_name: "Draftsman".to_string(),
            timestamp: Utc::now(),
            state_snapshot: json!({"status": "running", "iteration_count": 1, "extra": true}),
            note: "Draft created v1".to_string(),
        };

        let decoded: Probe = cp.state().unwrap();
        assert_eq!(decoded.status, "running");
        assert_eq!(decoded.iteration_count, 1);
    }

    #[test]
    fn test_checkpoint_ids_order_by_value() {
        assert!(CheckpointId(2) > CheckpointId(1));
        assert_eq!(CheckpointId(42).to_string(), "42");
    }

    #[test]
    fn test_validate_append_rejects_bad_input() {
        assert!(validate_append("", "starter", &json!({})).is_err());
        assert!(validate_append("run", " ", &json!({})).is_err());
        assert!(validate_append("run", "starter", &json!([1, 2])).is_err());
        assert!(validate_append("run", "starter", &json!({"a": 1})).is_ok());
    }
}
