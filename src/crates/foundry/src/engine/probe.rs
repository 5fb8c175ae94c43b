//! One-shot engine capability probe.

use super::shapes::{GraphBuilder, GraphEngine, TaskEngine};
use super::{panic_message, EngineError};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, info, warn};

type Factory<T> = Box<dyn Fn() -> Result<Box<T>, EngineError> + Send + Sync>;

/// Which engine interface a candidate implements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineShape {
    Graph,
    Tasks,
    Builder,
}

impl EngineShape {
    /// Probe order
    pub const PRIORITY: [EngineShape; 3] = [EngineShape::Graph, EngineShape::Tasks, EngineShape::Builder];

    /// Name of the registration operation
    pub fn add_op(&self) -> &'static str {
        match self {
            EngineShape::Graph | EngineShape::Builder => "add_node",
            EngineShape::Tasks => "add_task",
        }
    }

    /// Name of the execution entry point
    pub fn run_op(&self) -> &'static str {
        match self {
            EngineShape::Graph | EngineShape::Tasks => "run",
            EngineShape::Builder => "build",
        }
    }
}

enum EngineFactory {
    Graph(Factory<dyn GraphEngine>),
    Tasks(Factory<dyn TaskEngine>),
    Builder(Factory<dyn GraphBuilder>),
}

impl EngineFactory {
    fn shape(&self) -> EngineShape {
        match self {
            EngineFactory::Graph(_) => EngineShape::Graph,
            EngineFactory::Tasks(_) => EngineShape::Tasks,
            EngineFactory::Builder(_) => EngineShape::Builder,
        }
    }

    fn instantiate(&self) -> Result<EngineHandle, EngineError> {
        Ok(match self {
            EngineFactory::Graph(f) => EngineHandle::Graph(f()?),
            EngineFactory::Tasks(f) => EngineHandle::Tasks(f()?),
            EngineFactory::Builder(f) => EngineHandle::Builder(f()?),
        })
    }
}

struct Candidate {
    name: String,
    factory: EngineFactory,
}

/// Host-provided list of engines the probe may bind to.
///
/// ```rust
/// use foundry::engine::{probe, EngineCatalog};
///
/// let catalog = EngineCatalog::new();
/// assert!(probe(&catalog).is_none());
/// ```
#[derive(Default)]
pub struct EngineCatalog {
    candidates: Vec<Candidate>,
}

impl EngineCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_graph<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn GraphEngine>, EngineError> + Send + Sync + 'static,
    {
        self.push(name, EngineFactory::Graph(Box::new(factory)));
        self
    }

    pub fn register_tasks<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn TaskEngine>, EngineError> + Send + Sync + 'static,
    {
        self.push(name, EngineFactory::Tasks(Box::new(factory)));
        self
    }

    pub fn register_builder<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn GraphBuilder>, EngineError> + Send + Sync + 'static,
    {
        self.push(name, EngineFactory::Builder(Box::new(factory)));
        self
    }

    fn push(&mut self, name: impl Into<String>, factory: EngineFactory) {
        self.candidates.push(Candidate {
            name: name.into(),
            factory,
        });
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidate names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.name.as_str()).collect()
    }
}

impl fmt::Debug for EngineCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.candidates.iter().map(|c| (&c.name, c.factory.shape())))
            .finish()
    }
}

/// A freshly instantiated engine
pub enum EngineHandle {
    Graph(Box<dyn GraphEngine>),
    Tasks(Box<dyn TaskEngine>),
    Builder(Box<dyn GraphBuilder>),
}

impl EngineHandle {
    pub fn shape(&self) -> EngineShape {
        match self {
            EngineHandle::Graph(_) => EngineShape::Graph,
            EngineHandle::Tasks(_) => EngineShape::Tasks,
            EngineHandle::Builder(_) => EngineShape::Builder,
        }
    }
}

/// Successful probe result
pub struct EngineBinding {
    /// Catalog name of the bound candidate
    pub candidate: String,
    pub handle: EngineHandle,
    /// Detected registration operation
    pub add_op: &'static str,
    /// Detected execution entry point
    pub run_op: &'static str,
}

impl fmt::Debug for EngineBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBinding")
            .field("candidate", &self.candidate)
            .field("shape", &self.handle.shape())
            .field("add_op", &self.add_op)
            .field("run_op", &self.run_op)
            .finish()
    }
}

/// Bind the first candidate that instantiates.
///
/// Shapes are tried in [`EngineShape::PRIORITY`] order and candidates in
/// catalog order within a shape. Factory errors and panics count as "not
/// found"; this function never fails.
pub fn probe(catalog: &EngineCatalog) -> Option<EngineBinding> {
    for shape in EngineShape::PRIORITY {
        for candidate in catalog.candidates.iter().filter(|c| c.factory.shape() == shape) {
            debug!(candidate = %candidate.name, ?shape, "Probing engine");

            match catch_unwind(AssertUnwindSafe(|| candidate.factory.instantiate())) {
                Ok(Ok(handle)) => {
                    info!(
                        candidate = %candidate.name,
                        ?shape,
                        add_op = shape.add_op(),
                        run_op = shape.run_op(),
                        "External engine detected"
                    );
                    return Some(EngineBinding {
                        candidate: candidate.name.clone(),
                        handle,
                        add_op: shape.add_op(),
                        run_op: shape.run_op(),
                    });
                }
                Ok(Err(e)) => {
                    debug!(candidate = %candidate.name, error = %e, "Engine unavailable");
                }
                Err(payload) => {
                    warn!(
                        candidate = %candidate.name,
                        panic = %panic_message(payload.as_ref()),
                        "Engine constructor panicked"
                    );
                }
            }
        }
    }

    debug!("No external engine available");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CompiledGraph, StageFn};
    use crate::state::RunState;
    use async_trait::async_trait;

    struct NullTasks;

    #[async_trait]
    impl TaskEngine for NullTasks {
        fn add_task(&mut self, _name: &str, _task: StageFn) -> Result<(), EngineError> {
            Ok(())
        }

        async fn run(&self, input: RunState) -> Result<RunState, EngineError> {
            Ok(input)
        }
    }

    struct NullBuilder;

    impl GraphBuilder for NullBuilder {
        fn add_node(&mut self, _name: &str, _node: StageFn) -> Result<(), EngineError> {
            Ok(())
        }

        fn build(self: Box<Self>) -> Result<Box<dyn CompiledGraph>, EngineError> {
            Err(EngineError::failed("not needed"))
        }
    }

    #[test]
    fn test_empty_catalog() {
        assert!(probe(&EngineCatalog::new()).is_none());
    }

    #[test]
    fn test_failing_candidates_are_skipped() {
        let catalog = EngineCatalog::new()
            .register_graph("missing", || Err(EngineError::failed("library not loaded")))
            .register_graph("panics", || panic!("bad constructor"))
            .register_tasks("tasks", || Ok(Box::new(NullTasks) as Box<dyn TaskEngine>));

        let binding = probe(&catalog).unwrap();
        assert_eq!(binding.candidate, "tasks");
        assert_eq!(binding.add_op, "add_task");
        assert_eq!(binding.run_op, "run");
        assert_eq!(binding.handle.shape(), EngineShape::Tasks);
    }

    #[test]
    fn test_shape_priority_beats_catalog_order() {
        let catalog = EngineCatalog::new()
            .register_builder("builder", || Ok(Box::new(NullBuilder) as Box<dyn GraphBuilder>))
            .register_tasks("tasks", || Ok(Box::new(NullTasks) as Box<dyn TaskEngine>));

        let binding = probe(&catalog).unwrap();
        assert_eq!(binding.candidate, "tasks");
    }

    #[test]
    fn test_builder_ops() {
        let catalog = EngineCatalog::new()
            .register_builder("builder", || Ok(Box::new(NullBuilder) as Box<dyn GraphBuilder>));

        let binding = probe(&catalog).unwrap();
        assert_eq!(binding.add_op, "add_node");
        assert_eq!(binding.run_op, "build");
        assert_eq!(catalog.names(), vec!["builder"]);
    }
}
