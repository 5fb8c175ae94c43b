//! Error types for foundry
//!
//! [`FoundryError`] is what the orchestrator and run control return to callers.
//! Engine incompatibilities are absorbed before they get here; stage failures
//! arrive already checkpointed.

use crate::state::RunState;
use foundry_checkpoint::CheckpointError;
use llm::LlmError;
use thiserror::Error;

/// Result type alias for foundry operations
pub type Result<T> = std::result::Result<T, FoundryError>;

/// Main error type for foundry operations
#[derive(Debug, Error)]
pub enum FoundryError {
    /// No checkpoint exists for the run. Nothing was written.
    #[error("Run not found: {0}")]
    RunNotFound(String),

    /// A stage raised. The failure checkpoint has been appended.
    #[error("Stage '{stage}' failed: {message}")]
    StageFailure {
        stage: String,
        message: String,
        state: Box<RunState>,
    },

    /// The external engine could not be bound or invoked.
    #[error("External engine incompatible: {0}")]
    EngineIncompatible(String),

    /// The generation backend could not be reached or configured
    #[error("Generation backend unavailable: {0}")]
    BackendUnavailable(#[from] LlmError),

    /// Checkpoint store error
    #[error("Checkpoint store error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// A caller-supplied argument was rejected before anything was written
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FoundryError {
    /// Create a stage failure error
    pub fn stage_failure(stage: impl Into<String>, message: impl Into<String>, state: RunState) -> Self {
        Self::StageFailure {
            stage: stage.into(),
            message: message.into(),
            state: Box::new(state),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RunNotFound(_))
    }

    /// Check if a stage raised
    pub fn is_stage_failure(&self) -> bool {
        matches!(self, Self::StageFailure { .. })
    }

    /// Name of the failed stage, if any
    pub fn failed_stage(&self) -> Option<&str> {
        match self {
            Self::StageFailure { stage, .. } => Some(stage),
            _ => None,
        }
    }
}
