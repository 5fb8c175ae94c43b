use super::{Stage, StageError};
use crate::state::RunState;
use async_trait::async_trait;
use llm::{GenerateOptions, Generator};
use std::sync::Arc;

/// Critiques the draft clinically, then proposes a revision informed by the critique.
///
/// The revision is stored as `proposed_revision`; it does not become a new
/// draft version until a human approves it.
pub struct ClinicalCritic {
    generator: Arc<dyn Generator>,
    options: GenerateOptions,
}

impl ClinicalCritic {
    pub fn new(generator: Arc<dyn Generator>, options: GenerateOptions) -> Self {
        Self { generator, options }
    }
}

#[async_trait]
impl Stage for ClinicalCritic {
    fn name(&self) -> &str {
        "ClinicalCritic"
    }

    async fn run(&self, mut state: RunState) -> Result<RunState, StageError> {
        let draft = state.current_draft_text.clone();

        let critique_prompt = format!(
            "Provide a clinical critique of this CBT exercise focusing on empathy, clarity, and clinical appropriateness. Suggest a one-paragraph revision:\n\n{}",
            draft
        );
        let critique = self.generator.generate(&critique_prompt, &self.options).await?;
        let critique = critique.trim().to_string();

        let revision_prompt = format!(
            "Revise the draft to improve empathy and clarity.\n\nCritic notes:\n{}\n\nDraft:\n{}",
            critique, draft
        );
        let revision = self.generator.generate(&revision_prompt, &self.options).await?;

        state.set_field("critic_text", critique);
        state.set_field("proposed_revision", revision.trim());
        Ok(state)
    }

    fn completion_note(&self, _state: &RunState) -> String {
        "Clinical critique & revision".to_string()
    }
}
