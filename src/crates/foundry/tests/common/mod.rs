//! Common test utilities and setup
#![allow(dead_code)]

use async_trait::async_trait;
use foundry::engine::{
    CompiledGraph, EngineError, GraphBuilder, GraphEngine, StageFn, TaskEngine, END, START,
};
use foundry::{
    CheckpointStore, EngineCatalog, Orchestrator, RunController, RunState, SequentialExecutor,
    StageSequence,
};
use foundry_checkpoint::{InMemoryCheckpointStore, SqliteCheckpointStore};
use llm::{GenerateOptions, Generator, LlmError, MockGenerator};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const CBT_HISTORY: [&str; 5] = [
    "starter",
    "Draftsman",
    "SafetyGuardian",
    "ClinicalCritic",
    "supervisor",
];

/// Generator that is always down
#[derive(Debug, Default)]
pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> llm::Result<String> {
        Err(LlmError::ServiceUnavailable("model server offline".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Fails the first `failures` calls, then behaves like the mock
#[derive(Debug)]
pub struct FlakyGenerator {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyGenerator {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Generator for FlakyGenerator {
    async fn generate(&self, prompt: &str, _options: &GenerateOptions) -> llm::Result<String> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(LlmError::ServiceUnavailable("warming up".to_string()));
        }
        Ok(MockGenerator::response_for(prompt))
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Fails only its `nth` call (1-based), otherwise behaves like the mock
#[derive(Debug)]
pub struct FailsOnCall {
    nth: usize,
    calls: AtomicUsize,
}

impl FailsOnCall {
    pub fn new(nth: usize) -> Self {
        Self {
            nth,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Generator for FailsOnCall {
    async fn generate(&self, prompt: &str, _options: &GenerateOptions) -> llm::Result<String> {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.nth {
            return Err(LlmError::ServiceUnavailable("connection reset".to_string()));
        }
        Ok(MockGenerator::response_for(prompt))
    }

    fn name(&self) -> &str {
        "fails-on-call"
    }
}

pub fn executor(store: Arc<dyn CheckpointStore>, generator: Arc<dyn Generator>) -> SequentialExecutor {
    SequentialExecutor::new(store, StageSequence::cbt(generator, GenerateOptions::default()))
}

/// Controller over `store` with the given generator and engine catalog
pub fn controller_with(
    store: Arc<dyn CheckpointStore>,
    generator: Arc<dyn Generator>,
    catalog: &EngineCatalog,
) -> RunController {
    let orchestrator = Orchestrator::new(executor(store, generator.clone()), catalog);
    RunController::new(Arc::new(orchestrator), generator)
}

/// Sequential controller backed by the mock generator
pub fn mock_controller(store: &InMemoryCheckpointStore) -> RunController {
    controller_with(
        Arc::new(store.clone()),
        Arc::new(MockGenerator::new()),
        &EngineCatalog::new(),
    )
}

/// SQLite store in a fresh temp dir
pub async fn setup_sqlite_store() -> (TempDir, Arc<SqliteCheckpointStore>) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = SqliteCheckpointStore::open(temp_dir.path().join("foundry.db"))
        .await
        .expect("Failed to create test database");
    (temp_dir, Arc::new(store))
}

pub async fn stage_names(store: &dyn CheckpointStore, run_id: &str) -> Vec<String> {
    store
        .all(run_id)
        .await
        .expect("history")
        .into_iter()
        .map(|c| c.stage_name)
        .collect()
}

/// Node/edge runtime that walks edges from [`START`] to [`END`]
#[derive(Default)]
pub struct GraphRuntime {
    nodes: HashMap<String, StageFn>,
    edges: HashMap<String, String>,
    runs: Arc<AtomicUsize>,
    resumes: Arc<AtomicUsize>,
}

impl GraphRuntime {
    pub fn counting(runs: Arc<AtomicUsize>, resumes: Arc<AtomicUsize>) -> Self {
        Self {
            runs,
            resumes,
            ..Self::default()
        }
    }

    async fn walk(&self, from: &str, mut state: RunState) -> Result<RunState, EngineError> {
        let mut current = from.to_string();
        while current != END {
            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| EngineError::failed(format!("unknown node {}", current)))?;
            state = node(state).await?;
            current = self
                .edges
                .get(&current)
                .cloned()
                .ok_or_else(|| EngineError::failed(format!("no edge out of {}", current)))?;
        }
        Ok(state)
    }
}

#[async_trait]
impl GraphEngine for GraphRuntime {
    fn add_node(&mut self, name: &str, node: StageFn) -> Result<(), EngineError> {
        if self.nodes.contains_key(name) {
            return Err(EngineError::failed(format!("duplicate node {}", name)));
        }
        self.nodes.insert(name.to_string(), node);
        Ok(())
    }

    fn add_edge(&mut self, from: &str, to: &str) -> Result<(), EngineError> {
        self.edges.insert(from.to_string(), to.to_string());
        Ok(())
    }

    async fn run(&self, input: RunState) -> Result<RunState, EngineError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let entry = self
            .edges
            .get(START)
            .cloned()
            .ok_or_else(|| EngineError::failed("graph has no entry"))?;
        self.walk(&entry, input).await
    }

    async fn resume_from(&self, node: &str, input: RunState) -> Result<RunState, EngineError> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        self.walk(node, input).await
    }
}

/// Ordered task runner
#[derive(Default)]
pub struct TaskRunner {
    tasks: Vec<StageFn>,
    runs: Arc<AtomicUsize>,
}

impl TaskRunner {
    pub fn counting(runs: Arc<AtomicUsize>) -> Self {
        Self {
            tasks: Vec::new(),
            runs,
        }
    }
}

#[async_trait]
impl TaskEngine for TaskRunner {
    fn add_task(&mut self, _name: &str, task: StageFn) -> Result<(), EngineError> {
        self.tasks.push(task);
        Ok(())
    }

    async fn run(&self, mut input: RunState) -> Result<RunState, EngineError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        for task in &self.tasks {
            input = task(input).await?;
        }
        Ok(input)
    }
}

/// Builder whose compiled form runs nodes in registration order
#[derive(Default)]
pub struct PipelineBuilder {
    nodes: Vec<StageFn>,
}

pub struct CompiledPipeline {
    nodes: Vec<StageFn>,
}

impl GraphBuilder for PipelineBuilder {
    fn add_node(&mut self, _name: &str, node: StageFn) -> Result<(), EngineError> {
        self.nodes.push(node);
        Ok(())
    }

    fn build(self: Box<Self>) -> Result<Box<dyn CompiledGraph>, EngineError> {
        Ok(Box::new(CompiledPipeline { nodes: self.nodes }))
    }
}

#[async_trait]
impl CompiledGraph for CompiledPipeline {
    async fn run(&self, mut input: RunState) -> Result<RunState, EngineError> {
        for node in &self.nodes {
            input = node(input).await?;
        }
        Ok(input)
    }
}

/// How a [`FaultyEngine`] misbehaves at run time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Return an error before running anything
    Error,
    /// Panic before running anything
    Panic,
    /// Run the first task, then return an error
    ErrorAfterFirst,
    /// Return a state for another run
    WrongRun,
    /// Return the input without running anything
    Skip,
}

pub struct FaultyEngine {
    fault: Fault,
    tasks: Vec<StageFn>,
}

impl FaultyEngine {
    pub fn new(fault: Fault) -> Self {
        Self {
            fault,
            tasks: Vec::new(),
        }
    }
}

#[async_trait]
impl TaskEngine for FaultyEngine {
    fn add_task(&mut self, _name: &str, task: StageFn) -> Result<(), EngineError> {
        self.tasks.push(task);
        Ok(())
    }

    async fn run(&self, input: RunState) -> Result<RunState, EngineError> {
        match self.fault {
            Fault::Error => Err(EngineError::failed("scheduler offline")),
            Fault::Panic => panic!("engine internal invariant violated"),
            Fault::ErrorAfterFirst => {
                if let Some(first) = self.tasks.first() {
                    first(input).await?;
                }
                Err(EngineError::failed("worker lost"))
            }
            Fault::WrongRun => Ok(RunState::new("someone-else", "other")),
            Fault::Skip => Ok(input),
        }
    }
}
