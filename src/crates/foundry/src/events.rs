//! Progress events
//!
//! One [`ProgressEvent`] is emitted by the progress feed for every new
//! checkpoint of a watched run.

use chrono::{DateTime, Utc};
use foundry_checkpoint::{Checkpoint, CheckpointId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A checkpoint as seen by an observer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    /// Id of the checkpoint this event was built from
    #[serde(skip)]
    pub checkpoint_id: Option<CheckpointId>,

    /// Stage (or actor) that wrote the checkpoint
    #[serde(rename = "agent")]
    pub stage_name: String,

    pub timestamp: DateTime<Utc>,

    pub note: String,

    /// Full run state at the checkpoint
    pub state: Value,
}

impl ProgressEvent {
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        Self {
            checkpoint_id: Some(checkpoint.id),
            stage_name: checkpoint.stage_name.clone(),
            timestamp: checkpoint.timestamp,
            note: checkpoint.note.clone(),
            state: checkpoint.state_snapshot.clone(),
        }
    }

    /// Run status carried by the snapshot, if any
    pub fn status(&self) -> Option<&str> {
        self.state.get("status").and_then(Value::as_str)
    }

    /// One-line summary for terminal output
    pub fn description(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.stage_name,
            self.note
        )
    }

    /// Render as a server-sent-events `data:` frame.
    pub fn to_sse_frame(&self) -> serde_json::Result<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

impl From<&Checkpoint> for ProgressEvent {
    fn from(checkpoint: &Checkpoint) -> Self {
        Self::from_checkpoint(checkpoint)
    }
}
