//! Pipeline stages
//!
//! A [`Stage`] is a named `RunState -> RunState` transformation that may fail.
//! Stages never touch the checkpoint store themselves; whoever drives them
//! (the sequential executor or an external engine binding) appends one
//! checkpoint per execution using [`Stage::completion_note`] or the failure
//! message.
//!
//! [`StageSequence`] is the fixed, ordered list of stages that defines one
//! pipeline. [`StageSequence::cbt`] builds the default
//! draft → safety → critique → human-pause sequence.

mod critic;
mod draftsman;
mod safety;
mod supervisor;

pub use critic::ClinicalCritic;
pub use draftsman::Draftsman;
pub use safety::SafetyGuardian;
pub use supervisor::Supervisor;

use crate::state::RunState;
use async_trait::async_trait;
use futures::future::BoxFuture;
use llm::{GenerateOptions, Generator, LlmError};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Why a stage could not produce its output state
#[derive(Debug, Error)]
pub enum StageError {
    /// The generation backend failed
    #[error("{0}")]
    Backend(#[from] LlmError),

    /// The incoming state cannot be processed
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Any other stage-level failure
    #[error("{0}")]
    Failed(String),
}

impl StageError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// A named step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name used as the checkpoint's `stage_name`
    fn name(&self) -> &str;

    /// Transform the state.
    async fn run(&self, state: RunState) -> Result<RunState, StageError>;

    /// Note recorded with the checkpoint after a successful run.
    fn completion_note(&self, _state: &RunState) -> String {
        format!("{} completed", self.name())
    }
}

type StageFuture = BoxFuture<'static, Result<RunState, StageError>>;

/// Adapts a closure into a [`Stage`].
///
/// ```rust
/// use foundry::stages::{FnStage, Stage};
/// use foundry::RunState;
///
/// let tag = FnStage::new("tagger", |mut state: RunState| async move {
///     state.set_field("tagged", true);
///     Ok(state)
/// });
/// assert_eq!(tag.name(), "tagger");
/// ```
pub struct FnStage {
    name: String,
    func: Arc<dyn Fn(RunState) -> StageFuture + Send + Sync>,
    note: Option<String>,
}

impl FnStage {
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(RunState) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<RunState, StageError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(move |state| Box::pin(func(state))),
            note: None,
        }
    }

    /// Fixed completion note instead of `"<name> completed"`.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[async_trait]
impl Stage for FnStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: RunState) -> Result<RunState, StageError> {
        (self.func)(state).await
    }

    fn completion_note(&self, _state: &RunState) -> String {
        self.note
            .clone()
            .unwrap_or_else(|| format!("{} completed", self.name))
    }
}

/// Fixed ordered list of stages.
#[derive(Clone)]
pub struct StageSequence {
    stages: Vec<Arc<dyn Stage>>,
}

impl StageSequence {
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Draftsman → SafetyGuardian → ClinicalCritic → supervisor.
    pub fn cbt(generator: Arc<dyn Generator>, options: GenerateOptions) -> Self {
        Self::new(vec![
            Arc::new(Draftsman::new(generator.clone(), options.clone())),
            Arc::new(SafetyGuardian::new(generator.clone(), options.clone())),
            Arc::new(ClinicalCritic::new(generator, options)),
            Arc::new(Supervisor),
        ])
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn Stage>> {
        self.stages.get(index)
    }

    /// Index of the stage called `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Stage>> {
        self.stages.iter()
    }
}

impl fmt::Debug for StageSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::MockGenerator;

    #[test]
    fn test_cbt_sequence_order() {
        let seq = StageSequence::cbt(Arc::new(MockGenerator::new()), GenerateOptions::default());
        assert_eq!(
            seq.names(),
            vec!["Draftsman", "SafetyGuardian", "ClinicalCritic", "supervisor"]
        );
        assert_eq!(seq.position("ClinicalCritic"), Some(2));
        assert_eq!(seq.position("human"), None);
        assert_eq!(seq.len(), 4);
    }

    #[tokio::test]
    async fn test_fn_stage() {
        let stage = FnStage::new("upper", |mut state: RunState| async move {
            state.intent_text = state.intent_text.to_uppercase();
            Ok(state)
        })
        .with_note("shouted");

        let out = stage.run(RunState::new("r", "quiet")).await.unwrap();
        assert_eq!(out.intent_text, "QUIET");
        assert_eq!(stage.completion_note(&out), "shouted");
    }

    #[tokio::test]
    async fn test_fn_stage_failure() {
        let stage = FnStage::new("boom", |_state: RunState| async move {
            Err(StageError::failed("exploded"))
        });
        let err = stage.run(RunState::new("r", "x")).await.unwrap_err();
        assert_eq!(err.to_string(), "exploded");
        assert_eq!(stage.completion_note(&RunState::new("r", "x")), "boom completed");
    }
}
