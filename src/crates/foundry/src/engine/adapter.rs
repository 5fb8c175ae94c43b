use super::probe::{EngineBinding, EngineHandle, EngineShape};
use super::shapes::{CompiledGraph, GraphEngine, TaskEngine, END, START};
use super::{panic_message, EngineError, StageFn};
use crate::error::{FoundryError, Result};
use crate::executor::{PipelineBackend, SequentialExecutor};
use crate::resume::ResumePoint;
use crate::stages::StageError;
use crate::state::{RunState, RunStatus};
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Recorded when an engine run ends on a state no stage checkpointed
pub const ENGINE_RUN_CHECKPOINT: &str = "engine_run";

/// Recorded when an engine resume ends on a state no stage checkpointed
pub const ENGINE_RESUME_CHECKPOINT: &str = "engine_resume";

enum Runner {
    Graph(Box<dyn GraphEngine>),
    Tasks(Box<dyn TaskEngine>),
    Compiled(Box<dyn CompiledGraph>),
}

impl Runner {
    async fn run(&self, input: RunState) -> std::result::Result<RunState, EngineError> {
        match self {
            Runner::Graph(engine) => engine.run(input).await,
            Runner::Tasks(engine) => engine.run(input).await,
            Runner::Compiled(graph) => graph.run(input).await,
        }
    }

    fn shape(&self) -> EngineShape {
        match self {
            Runner::Graph(_) => EngineShape::Graph,
            Runner::Tasks(_) => EngineShape::Tasks,
            Runner::Compiled(_) => EngineShape::Builder,
        }
    }
}

/// Stage failures seen inside the engine, keyed by run id
type FailureLedger = Arc<Mutex<HashMap<String, FoundryError>>>;

/// Serves the pipeline through a bound external engine.
///
/// Every stage is registered as a wrapper around
/// [`SequentialExecutor::execute_stage`], so checkpoints are identical to the
/// sequential backend. A stage failure inside the engine is the caller's
/// error; any other engine error or panic hands the call to the executor,
/// which continues from the run's latest checkpoint under the same run id.
pub struct EngineAdapter {
    executor: SequentialExecutor,
    runner: Runner,
    candidate: String,
    failures: FailureLedger,
}

impl EngineAdapter {
    /// Register the executor's stages on a probed engine.
    ///
    /// Returns [`FoundryError::EngineIncompatible`] if any registration call
    /// errors or panics; the engine must then not be used at all.
    pub fn bind(binding: EngineBinding, executor: SequentialExecutor) -> Result<Self> {
        let EngineBinding {
            candidate, handle, ..
        } = binding;
        let failures: FailureLedger = Arc::new(Mutex::new(HashMap::new()));

        let registered = catch_unwind(AssertUnwindSafe(|| register(handle, &executor, &failures)));
        let runner = match registered {
            Ok(Ok(runner)) => runner,
            Ok(Err(e)) => {
                return Err(FoundryError::EngineIncompatible(format!("{}: {}", candidate, e)));
            }
            Err(payload) => {
                return Err(FoundryError::EngineIncompatible(format!(
                    "{}: registration panicked: {}",
                    candidate,
                    panic_message(payload.as_ref())
                )));
            }
        };

        info!(
            candidate = %candidate,
            shape = ?runner.shape(),
            stages = executor.sequence().len(),
            "Pipeline registered on external engine"
        );

        Ok(Self {
            executor,
            runner,
            candidate,
            failures,
        })
    }

    /// Catalog name of the bound engine
    pub fn candidate(&self) -> &str {
        &self.candidate
    }

    pub fn shape(&self) -> EngineShape {
        self.runner.shape()
    }

    pub fn executor(&self) -> &SequentialExecutor {
        &self.executor
    }

    async fn take_failure(&self, run_id: &str) -> Option<FoundryError> {
        self.failures.lock().await.remove(run_id)
    }

    /// Accept the state an engine call returned.
    ///
    /// If the engine stopped before the end of the sequence the executor
    /// finishes the run. A final state that differs from the latest checkpoint
    /// is recorded under `stage_name`.
    async fn settle(&self, run_id: &str, returned: RunState, stage_name: &str, note: &str) -> Result<RunState> {
        let (checkpoint, latest) = self.executor.latest_state(run_id).await?;
        let point = self
            .executor
            .policy()
            .resolve(&checkpoint.stage_name, &latest, self.executor.sequence());

        if let ResumePoint::At(index) = point {
            warn!(run_id, index, "Engine returned before the sequence ended; executor continues");
            return self.executor.resume_run(run_id).await;
        }

        if returned != latest {
            self.executor.checkpoint(&returned, stage_name, note).await?;
        }
        Ok(returned)
    }

    async fn fall_back(&self, run_id: &str, reason: &str) -> Result<RunState> {
        warn!(run_id, candidate = %self.candidate, reason, "Engine call failed; falling back to sequential executor");
        self.executor.resume_run(run_id).await
    }
}

fn register(handle: EngineHandle, executor: &SequentialExecutor, failures: &FailureLedger) -> std::result::Result<Runner, EngineError> {
    let sequence = executor.sequence();
    let names = sequence.names();
    let node = |index: usize| stage_fn(index, executor.clone(), failures.clone());

    match handle {
        EngineHandle::Graph(mut engine) => {
            for (index, name) in names.iter().enumerate() {
                engine.add_node(name, node(index))?;
            }
            if let (Some(first), Some(last)) = (names.first(), names.last()) {
                engine.add_edge(START, first)?;
                for pair in names.windows(2) {
                    engine.add_edge(pair[0], pair[1])?;
                }
                engine.add_edge(last, END)?;
            }
            Ok(Runner::Graph(engine))
        }
        EngineHandle::Tasks(mut engine) => {
            for (index, name) in names.iter().enumerate() {
                engine.add_task(name, node(index))?;
            }
            Ok(Runner::Tasks(engine))
        }
        EngineHandle::Builder(mut builder) => {
            for (index, name) in names.iter().enumerate() {
                builder.add_node(name, node(index))?;
            }
            Ok(Runner::Compiled(builder.build()?))
        }
    }
}

fn stage_fn(index: usize, executor: SequentialExecutor, failures: FailureLedger) -> StageFn {
    Arc::new(move |state: RunState| {
        let executor = executor.clone();
        let failures = failures.clone();
        Box::pin(async move {
            let run_id = state.run_id.clone();
            match executor.execute_stage(index, state).await {
                Ok(next) => Ok(next),
                Err(e) => {
                    let message = e.to_string();
                    failures.lock().await.insert(run_id, e);
                    Err(StageError::Failed(message))
                }
            }
        })
    })
}

#[async_trait]
impl PipelineBackend for EngineAdapter {
    #[instrument(skip(self), fields(backend = "external", candidate = %self.candidate))]
    async fn start_run(&self, intent: &str) -> Result<String> {
        let state = self.executor.begin(intent).await?;
        let run_id = state.run_id.clone();
        self.take_failure(&run_id).await;

        let outcome = AssertUnwindSafe(self.runner.run(state)).catch_unwind().await;
        if let Some(err) = self.take_failure(&run_id).await {
            return Err(err);
        }

        match outcome {
            Ok(Ok(returned)) if returned.run_id == run_id => {
                self.settle(&run_id, returned, ENGINE_RUN_CHECKPOINT, "graph run complete")
                    .await?;
            }
            Ok(Ok(returned)) => {
                let reason = format!("engine returned state for run {}", returned.run_id);
                self.fall_back(&run_id, &reason).await?;
            }
            Ok(Err(e)) => {
                self.fall_back(&run_id, &e.to_string()).await?;
            }
            Err(payload) => {
                self.fall_back(&run_id, &panic_message(payload.as_ref())).await?;
            }
        }

        info!(run_id = %run_id, "Run reached pause point");
        Ok(run_id)
    }

    #[instrument(skip(self), fields(backend = "external", candidate = %self.candidate))]
    async fn resume_run(&self, run_id: &str) -> Result<RunState> {
        let (checkpoint, mut state) = self.executor.latest_state(run_id).await?;
        let point = self
            .executor
            .policy()
            .resolve(&checkpoint.stage_name, &state, self.executor.sequence());
        info!(run_id, after = %checkpoint.stage_name, ?point, "Resuming run");

        let index = match point {
            ResumePoint::Complete => return self.executor.finish(state).await,
            ResumePoint::At(index) => index,
        };

        let engine = match &self.runner {
            Runner::Graph(engine) => engine,
            _ => return self.executor.resume_run(run_id).await,
        };
        let node = match self.executor.sequence().get(index) {
            Some(stage) => stage.name().to_string(),
            None => return self.executor.resume_run(run_id).await,
        };

        if state.status == RunStatus::Error {
            state.status = RunStatus::Running;
        }
        self.take_failure(run_id).await;

        let outcome = AssertUnwindSafe(engine.resume_from(&node, state))
            .catch_unwind()
            .await;
        if let Some(err) = self.take_failure(run_id).await {
            return Err(err);
        }

        match outcome {
            Ok(Ok(returned)) if returned.run_id == run_id => {
                self.settle(run_id, returned, ENGINE_RESUME_CHECKPOINT, "graph resumed")
                    .await
            }
            Ok(Ok(returned)) => {
                let reason = format!("engine returned state for run {}", returned.run_id);
                self.fall_back(run_id, &reason).await
            }
            Ok(Err(EngineError::Unsupported(op))) => {
                debug!(run_id, op, "Engine cannot resume mid-graph");
                self.executor.resume_run(run_id).await
            }
            Ok(Err(e)) => self.fall_back(run_id, &e.to_string()).await,
            Err(payload) => self.fall_back(run_id, &panic_message(payload.as_ref())).await,
        }
    }

    fn backend_name(&self) -> &'static str {
        "external"
    }
}
