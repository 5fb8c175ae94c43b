use super::{Stage, StageError};
use crate::state::{RunState, RunStatus};
use async_trait::async_trait;

/// Terminal stage: hands the run to a human.
#[derive(Debug, Clone, Copy, Default)]
pub struct Supervisor;

#[async_trait]
impl Stage for Supervisor {
    fn name(&self) -> &str {
        "supervisor"
    }

    async fn run(&self, mut state: RunState) -> Result<RunState, StageError> {
        state.status = RunStatus::PausedForHuman;
        Ok(state)
    }

    fn completion_note(&self, _state: &RunState) -> String {
        "awaiting human approval".to_string()
    }
}
