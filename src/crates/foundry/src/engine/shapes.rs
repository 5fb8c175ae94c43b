//! The engine interfaces an external graph runtime can be bound through.
//!
//! A runtime is usable if it can be wrapped as one of three shapes. Each
//! registration method receives a [`StageFn`]; the binding owns all call
//! conventions, so nothing is discovered at run time.

use super::{EngineError, StageFn};
use crate::state::RunState;
use async_trait::async_trait;

/// Virtual entry node for [`GraphEngine::add_edge`]
pub const START: &str = "__start__";

/// Virtual exit node for [`GraphEngine::add_edge`]
pub const END: &str = "__end__";

/// Node/edge graph with a run entry point.
#[async_trait]
pub trait GraphEngine: Send + Sync {
    fn add_node(&mut self, name: &str, node: StageFn) -> Result<(), EngineError>;

    fn add_edge(&mut self, from: &str, to: &str) -> Result<(), EngineError>;

    /// Execute from [`START`] to [`END`].
    async fn run(&self, input: RunState) -> Result<RunState, EngineError>;

    /// Execute from `node` to [`END`]. Optional.
    async fn resume_from(&self, node: &str, input: RunState) -> Result<RunState, EngineError> {
        let _ = (node, input);
        Err(EngineError::Unsupported("resume_from"))
    }
}

/// Ordered task list with a run entry point.
#[async_trait]
pub trait TaskEngine: Send + Sync {
    /// Tasks run in registration order.
    fn add_task(&mut self, name: &str, task: StageFn) -> Result<(), EngineError>;

    async fn run(&self, input: RunState) -> Result<RunState, EngineError>;
}

/// Builder that is compiled once all nodes are registered.
///
/// Nodes run in registration order.
pub trait GraphBuilder: Send {
    fn add_node(&mut self, name: &str, node: StageFn) -> Result<(), EngineError>;

    fn build(self: Box<Self>) -> Result<Box<dyn CompiledGraph>, EngineError>;
}

/// Output of [`GraphBuilder::build`].
#[async_trait]
pub trait CompiledGraph: Send + Sync {
    async fn run(&self, input: RunState) -> Result<RunState, EngineError>;
}
