use super::{Stage, StageError};
use crate::state::RunState;
use async_trait::async_trait;
use llm::{GenerateOptions, Generator};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_INTENT: &str = "Create a CBT exercise";

/// Writes a new draft exercise from the run's intent.
pub struct Draftsman {
    generator: Arc<dyn Generator>,
    options: GenerateOptions,
}

impl Draftsman {
    pub fn new(generator: Arc<dyn Generator>, options: GenerateOptions) -> Self {
        Self { generator, options }
    }

    fn prompt(intent: &str) -> String {
        format!(
            "Create a short CBT exercise based on this intent:\n\n{}\n\nOutput a concise step-by-step exercise.",
            intent
        )
    }
}

#[async_trait]
impl Stage for Draftsman {
    fn name(&self) -> &str {
        "Draftsman"
    }

    async fn run(&self, mut state: RunState) -> Result<RunState, StageError> {
        let intent = if state.intent_text.trim().is_empty() {
            DEFAULT_INTENT
        } else {
            state.intent_text.as_str()
        };

        let text = self
            .generator
            .generate(&Self::prompt(intent), &self.options)
            .await?;

        let version = state.push_draft(text.trim());
        debug!(run_id = %state.run_id, version, "Draft written");
        Ok(state)
    }

    fn completion_note(&self, state: &RunState) -> String {
        format!("Draft created v{}", state.latest_version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::MockGenerator;

    #[tokio::test]
    async fn test_draft_is_versioned() {
        let stage = Draftsman::new(Arc::new(MockGenerator::new()), GenerateOptions::default());

        let state = stage.run(RunState::new("r", "help with sleep")).await.unwrap();
        assert!(state.current_draft_text.starts_with("[MOCK]"));
        assert!(state.current_draft_text.contains("help with sleep"));
        assert_eq!(state.draft_versions.len(), 1);
        assert_eq!(state.iteration_count, 1);
        assert_eq!(stage.completion_note(&state), "Draft created v1");

        let state = stage.run(state).await.unwrap();
        assert_eq!(state.draft_versions[1].version, 2);
        assert_eq!(stage.completion_note(&state), "Draft created v2");
    }

    #[tokio::test]
    async fn test_empty_intent_uses_default() {
        let stage = Draftsman::new(Arc::new(MockGenerator::new()), GenerateOptions::default());
        let state = stage.run(RunState::new("r", "  ")).await.unwrap();
        assert!(state.current_draft_text.contains(DEFAULT_INTENT));
    }
}
