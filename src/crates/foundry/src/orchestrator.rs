//! Orchestrator facade
//!
//! [`Orchestrator`] is constructed once per process and handed to every
//! caller. Construction probes the [`EngineCatalog`] a single time and picks
//! the backend; callers only ever see `start_run` and `resume_run`.

use crate::engine::{probe, EngineAdapter, EngineCatalog};
use crate::error::Result;
use crate::executor::{PipelineBackend, SequentialExecutor};
use crate::state::RunState;
use foundry_checkpoint::CheckpointStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Single entry point to the pipeline.
#[derive(Clone)]
pub struct Orchestrator {
    backend: Arc<dyn PipelineBackend>,
    executor: SequentialExecutor,
}

impl Orchestrator {
    /// Probe `catalog` and bind the first usable engine, or use `executor`.
    ///
    /// Never fails: an absent or incompatible engine means the sequential
    /// executor serves every call for the lifetime of this value.
    pub fn new(executor: SequentialExecutor, catalog: &EngineCatalog) -> Self {
        let backend: Arc<dyn PipelineBackend> = match probe(catalog) {
            Some(binding) => match EngineAdapter::bind(binding, executor.clone()) {
                Ok(adapter) => Arc::new(adapter),
                Err(e) => {
                    warn!(error = %e, "External engine rejected; using sequential executor");
                    Arc::new(executor.clone())
                }
            },
            None => Arc::new(executor.clone()),
        };

        info!(
            backend = backend.backend_name(),
            stages = ?executor.sequence().names(),
            "Orchestrator ready"
        );
        Self { backend, executor }
    }

    /// Orchestrator that never consults an external engine.
    pub fn sequential(executor: SequentialExecutor) -> Self {
        Self::new(executor, &EngineCatalog::new())
    }

    /// Start a run and drive it to the human pause. Returns the new run id.
    pub async fn start_run(&self, intent: &str) -> Result<String> {
        self.backend.start_run(intent).await
    }

    /// Continue a run from its latest checkpoint.
    pub async fn resume_run(&self, run_id: &str) -> Result<RunState> {
        self.backend.resume_run(run_id).await
    }

    /// `"external"` or `"sequential"`
    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    pub fn executor(&self) -> &SequentialExecutor {
        &self.executor
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        self.executor.store()
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("backend", &self.backend_name())
            .field("sequence", self.executor.sequence())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, GraphEngine};
    use crate::stages::StageSequence;
    use foundry_checkpoint::InMemoryCheckpointStore;
    use llm::{GenerateOptions, MockGenerator};

    fn executor() -> SequentialExecutor {
        SequentialExecutor::new(
            Arc::new(InMemoryCheckpointStore::new()),
            StageSequence::cbt(Arc::new(MockGenerator::new()), GenerateOptions::default()),
        )
    }

    #[test]
    fn test_no_engine_uses_sequential() {
        let orchestrator = Orchestrator::new(executor(), &EngineCatalog::new());
        assert_eq!(orchestrator.backend_name(), "sequential");
    }

    #[test]
    fn test_unavailable_engine_uses_sequential() {
        let catalog = EngineCatalog::new().register_graph("absent", || {
            Err::<Box<dyn GraphEngine>, _>(EngineError::failed("not installed"))
        });
        let orchestrator = Orchestrator::new(executor(), &catalog);
        assert_eq!(orchestrator.backend_name(), "sequential");
    }
}
