//! Where a resumed run picks up
//!
//! Checkpoints written by a stage of the sequence resume at the stage after it.
//! Everything else (the `starter` record, human approvals, summaries, engine
//! records) is looked up in an explicit table; names missing from the table use
//! a configurable fallback.

use crate::stages::StageSequence;
use crate::state::{RunState, RunStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What to do for a checkpoint that was not written by a sequence stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeAction {
    /// Run the whole sequence again from the first stage
    Restart,
    /// Nothing remains to run
    Complete,
}

/// Resolved resume point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePoint {
    /// Execute stages from this index onwards
    At(usize),
    /// No stage remains
    Complete,
}

/// Maps a latest checkpoint to a [`ResumePoint`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResumePolicy {
    /// Action for names that are neither stages nor listed in `checkpoints`
    pub unknown: ResumeAction,

    /// Explicit actions for non-stage checkpoint names
    pub checkpoints: HashMap<String, ResumeAction>,
}

impl Default for ResumePolicy {
    fn default() -> Self {
        let checkpoints = [
            ("starter", ResumeAction::Restart),
            ("human", ResumeAction::Complete),
            ("summary_agent", ResumeAction::Complete),
            ("engine_run", ResumeAction::Complete),
            ("engine_resume", ResumeAction::Complete),
            ("complete", ResumeAction::Complete),
        ]
        .into_iter()
        .map(|(name, action)| (name.to_string(), action))
        .collect();

        Self {
            unknown: ResumeAction::Restart,
            checkpoints,
        }
    }
}

impl ResumePolicy {
    /// Override the action for one checkpoint name.
    pub fn with_checkpoint(mut self, name: impl Into<String>, action: ResumeAction) -> Self {
        self.checkpoints.insert(name.into(), action);
        self
    }

    /// Set the fallback for unlisted names.
    pub fn with_unknown(mut self, action: ResumeAction) -> Self {
        self.unknown = action;
        self
    }

    /// Decide where to resume after the checkpoint `stage_name` holding `state`.
    ///
    /// A failure checkpoint (status `error`) re-runs the stage that failed, so a
    /// resume after an operator fix retries exactly that stage.
    pub fn resolve(&self, stage_name: &str, state: &RunState, sequence: &StageSequence) -> ResumePoint {
        if let Some(index) = sequence.position(stage_name) {
            if state.status == RunStatus::Error {
                return ResumePoint::At(index);
            }
            return if index + 1 < sequence.len() {
                ResumePoint::At(index + 1)
            } else {
                ResumePoint::Complete
            };
        }

        let action = self
            .checkpoints
            .get(stage_name)
            .copied()
            .unwrap_or(self.unknown);

        match action {
            ResumeAction::Restart if !sequence.is_empty() => ResumePoint::At(0),
            _ => ResumePoint::Complete,
        }
    }
}
