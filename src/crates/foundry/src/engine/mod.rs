//! Optional external graph-execution engine
//!
//! At orchestrator construction, [`probe`] walks an [`EngineCatalog`] of
//! host-provided engine factories and binds the first one that instantiates.
//! [`EngineAdapter`] then registers the pipeline's stages on it and serves
//! `start_run`/`resume_run` through it, delegating any call the engine cannot
//! complete to the [`SequentialExecutor`](crate::SequentialExecutor).
//!
//! Nothing here ever surfaces an engine fault to a caller: a failed probe is
//! "no engine", a failed registration is "use the executor for the whole
//! process", a failed invocation is "use the executor for this call".

mod adapter;
mod probe;
mod shapes;

pub use adapter::EngineAdapter;
pub use probe::{probe, EngineBinding, EngineCatalog, EngineHandle, EngineShape};
pub use shapes::{CompiledGraph, GraphBuilder, GraphEngine, TaskEngine, END, START};

use crate::stages::StageError;
use crate::state::RunState;
use futures::future::BoxFuture;
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// A stage as handed to an external engine.
pub type StageFn =
    Arc<dyn Fn(RunState) -> BoxFuture<'static, Result<RunState, StageError>> + Send + Sync>;

/// Errors raised by an engine binding
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine lacks an optional operation
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// A registered stage failed inside the engine
    #[error("stage failed: {0}")]
    Stage(#[from] StageError),

    /// Any other engine fault
    #[error("engine failure: {0}")]
    Failed(String),
}

impl EngineError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Render a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let caught = std::panic::catch_unwind(|| panic!("graph exploded")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "graph exploded");

        let caught = std::panic::catch_unwind(|| panic!("{} nodes", 4)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "4 nodes");
    }

    #[test]
    fn test_engine_error_display() {
        assert_eq!(
            EngineError::Unsupported("resume_from").to_string(),
            "operation not supported: resume_from"
        );
        let err: EngineError = StageError::failed("boom").into();
        assert_eq!(err.to_string(), "stage failed: boom");
    }
}
