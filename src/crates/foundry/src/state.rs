//! Run state threaded through every stage
//!
//! [`RunState`] carries the well-known fields as typed members and everything a
//! stage adds on its own (`safety_flags`, `critic_text`, ...) in an open
//! extension map that is flattened into the same JSON object. The JSON form is
//! exactly what gets checkpointed.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Field names owned by [`RunState`] itself; never stored in the extension map.
const RESERVED_FIELDS: &[&str] = &[
    "run_id",
    "status",
    "intent_text",
    "current_draft_text",
    "draft_versions",
    "iteration_count",
    "approved_text",
];

/// Lifecycle status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Stages are executing
    Running,
    /// Waiting at the human hand-off point
    PausedForHuman,
    /// A human approved the draft
    ApprovedByHuman,
    /// No stages remain
    Completed,
    /// A stage raised
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::PausedForHuman => "paused_for_human",
            RunStatus::ApprovedByHuman => "approved_by_human",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        }
    }

    /// No further stage will run without outside action.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Error)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the draft history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftVersion {
    pub version: u32,
    pub text: String,
}

/// JSON-compatible record passed from stage to stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,

    pub status: RunStatus,

    #[serde(default)]
    pub intent_text: String,

    #[serde(default)]
    pub current_draft_text: String,

    /// Append-only; versions run `1..=N` in order
    #[serde(default)]
    pub draft_versions: Vec<DraftVersion>,

    #[serde(default)]
    pub iteration_count: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_text: Option<String>,

    /// Stage-specific fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RunState {
    /// Initial state for `run_id`.
    pub fn new(run_id: impl Into<String>, intent_text: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            status: RunStatus::Running,
            intent_text: intent_text.into(),
            current_draft_text: String::new(),
            draft_versions: Vec::new(),
            iteration_count: 0,
            approved_text: None,
            fields: Map::new(),
        }
    }

    /// Initial state under a freshly generated run id.
    pub fn fresh(intent_text: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), intent_text)
    }

    /// Record a new draft as the current one.
    ///
    /// Returns the version number assigned.
    pub fn push_draft(&mut self, text: impl Into<String>) -> u32 {
        let text = text.into();
        let version = self.draft_versions.len() as u32 + 1;
        self.current_draft_text = text.clone();
        self.draft_versions.push(DraftVersion { version, text });
        self.iteration_count += 1;
        version
    }

    /// Latest draft version number, 0 when no draft exists.
    pub fn latest_version(&self) -> u32 {
        self.draft_versions.last().map(|d| d.version).unwrap_or(0)
    }

    /// Read a stage-specific field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Read a stage-specific string field.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Set a stage-specific field. Reserved names are ignored.
    pub fn set_field(&mut self, key: &str, value: impl Into<Value>) {
        if RESERVED_FIELDS.contains(&key) {
            tracing::warn!(field = key, "Refusing to shadow a core state field");
            return;
        }
        self.fields.insert(key.to_string(), value.into());
    }

    /// Text a human approved, else the current draft.
    pub fn effective_text(&self) -> &str {
        self.approved_text
            .as_deref()
            .unwrap_or(&self.current_draft_text)
    }

    /// Check the draft history invariant.
    pub fn drafts_are_consistent(&self) -> bool {
        self.draft_versions
            .iter()
            .enumerate()
            .all(|(i, d)| d.version == i as u32 + 1)
            && self.iteration_count as usize >= self.draft_versions.len()
    }

    /// Encode as the JSON object stored in checkpoints.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode a checkpointed JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
