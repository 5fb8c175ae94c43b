//! Sequential stage executor
//!
//! [`SequentialExecutor`] is the dependency-free implementation of the pipeline
//! contract. It appends a `starter` checkpoint, runs each stage in order and
//! checkpoints after every one. A stage failure is checkpointed under the
//! stage's name with the pre-stage state marked `error`, then returned as
//! [`FoundryError::StageFailure`]; no later stage runs.
//!
//! The external engine adapter reuses [`SequentialExecutor::begin`] and
//! [`SequentialExecutor::execute_stage`] so both backends leave identical
//! checkpoint histories.

use crate::error::{FoundryError, Result};
use crate::resume::{ResumePoint, ResumePolicy};
use crate::stages::StageSequence;
use crate::state::{RunState, RunStatus};
use async_trait::async_trait;
use foundry_checkpoint::{Checkpoint, CheckpointStore};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Stage name of the first checkpoint of every run
pub const STARTER_CHECKPOINT: &str = "starter";

/// Stage name recorded when an approved run is closed out
pub const COMPLETE_CHECKPOINT: &str = "complete";

/// The two operations every pipeline backend provides.
#[async_trait]
pub trait PipelineBackend: Send + Sync {
    /// Start a fresh run and drive it to the pause point. Returns the run id.
    async fn start_run(&self, intent: &str) -> Result<String>;

    /// Continue `run_id` from its latest checkpoint and return the final state.
    async fn resume_run(&self, run_id: &str) -> Result<RunState>;

    /// Short name for logs
    fn backend_name(&self) -> &'static str;
}

/// Runs a [`StageSequence`] in-process, checkpointing after each stage.
#[derive(Clone)]
pub struct SequentialExecutor {
    store: Arc<dyn CheckpointStore>,
    sequence: StageSequence,
    policy: ResumePolicy,
}

impl SequentialExecutor {
    pub fn new(store: Arc<dyn CheckpointStore>, sequence: StageSequence) -> Self {
        Self {
            store,
            sequence,
            policy: ResumePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ResumePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    pub fn sequence(&self) -> &StageSequence {
        &self.sequence
    }

    pub fn policy(&self) -> &ResumePolicy {
        &self.policy
    }

    /// Append a checkpoint holding `state`.
    pub async fn checkpoint(&self, state: &RunState, stage_name: &str, note: &str) -> Result<Checkpoint> {
        let checkpoint = self
            .store
            .append(&state.run_id, stage_name, state.to_value()?, note)
            .await?;
        debug!(
            run_id = %state.run_id,
            stage = stage_name,
            checkpoint_id = %checkpoint.id,
            note,
            "Checkpoint saved"
        );
        Ok(checkpoint)
    }

    /// Latest checkpoint of `run_id` and its decoded state.
    pub async fn latest_state(&self, run_id: &str) -> Result<(Checkpoint, RunState)> {
        let checkpoint = self
            .store
            .latest(run_id)
            .await?
            .ok_or_else(|| FoundryError::RunNotFound(run_id.to_string()))?;
        let state = RunState::from_value(checkpoint.state_snapshot.clone())?;
        Ok((checkpoint, state))
    }

    /// Create a run and record its `starter` checkpoint.
    pub async fn begin(&self, intent: &str) -> Result<RunState> {
        let state = RunState::fresh(intent);
        self.checkpoint(&state, STARTER_CHECKPOINT, "run started").await?;
        info!(run_id = %state.run_id, "Run started");
        Ok(state)
    }

    /// Run the stage at `index` and checkpoint the outcome.
    pub async fn execute_stage(&self, index: usize, state: RunState) -> Result<RunState> {
        let stage = self
            .sequence
            .get(index)
            .ok_or_else(|| FoundryError::config(format!("no stage at index {}", index)))?
            .clone();
        let name = stage.name().to_string();
        let before = state.clone();

        debug!(run_id = %state.run_id, stage = %name, "Stage starting");
        match stage.run(state).await {
            Ok(next) => {
                let note = stage.completion_note(&next);
                self.checkpoint(&next, &name, &note).await?;
                Ok(next)
            }
            Err(e) => {
                let message = e.to_string();
                let mut failed = before;
                failed.status = RunStatus::Error;
                error!(run_id = %failed.run_id, stage = %name, error = %message, "Stage failed");
                self.checkpoint(&failed, &name, &format!("{} error: {}", name, message))
                    .await?;
                Err(FoundryError::stage_failure(name, message, failed))
            }
        }
    }

    /// Execute stages `from..` in order.
    pub async fn run_from(&self, mut state: RunState, from: usize) -> Result<RunState> {
        for index in from..self.sequence.len() {
            state = self.execute_stage(index, state).await?;
        }
        Ok(state)
    }

    /// Close out a run that has nothing left to execute.
    ///
    /// An approved run moves to `completed` with one `complete` checkpoint;
    /// anything else is returned unchanged.
    pub async fn finish(&self, mut state: RunState) -> Result<RunState> {
        if state.status == RunStatus::ApprovedByHuman {
            state.status = RunStatus::Completed;
            self.checkpoint(&state, COMPLETE_CHECKPOINT, "run completed").await?;
            info!(run_id = %state.run_id, "Run completed");
        }
        Ok(state)
    }
}

#[async_trait]
impl PipelineBackend for SequentialExecutor {
    #[instrument(skip(self), fields(backend = "sequential"))]
    async fn start_run(&self, intent: &str) -> Result<String> {
        let state = self.begin(intent).await?;
        let run_id = state.run_id.clone();
        let state = self.run_from(state, 0).await?;
        info!(run_id = %run_id, status = %state.status, "Run reached pause point");
        Ok(run_id)
    }

    #[instrument(skip(self), fields(backend = "sequential"))]
    async fn resume_run(&self, run_id: &str) -> Result<RunState> {
        let (checkpoint, mut state) = self.latest_state(run_id).await?;
        let point = self.policy.resolve(&checkpoint.stage_name, &state, &self.sequence);
        info!(run_id, after = %checkpoint.stage_name, ?point, "Resuming run");

        match point {
            ResumePoint::At(index) => {
                if state.status == RunStatus::Error {
                    state.status = RunStatus::Running;
                }
                self.run_from(state, index).await
            }
            ResumePoint::Complete => self.finish(state).await,
        }
    }

    fn backend_name(&self) -> &'static str {
        "sequential"
    }
}
