use super::{Stage, StageError};
use crate::state::RunState;
use async_trait::async_trait;
use llm::{GenerateOptions, Generator};
use serde_json::Value;
use std::sync::Arc;

const SELF_HARM_TERMS: &[&str] = &["suicide", "self-harm"];
const CLEAN_SCORE: f64 = 0.95;
const FLAGGED_SCORE: f64 = 0.2;

/// Screens the current draft and records flags, a score and the model's summary.
pub struct SafetyGuardian {
    generator: Arc<dyn Generator>,
    options: GenerateOptions,
}

impl SafetyGuardian {
    pub fn new(generator: Arc<dyn Generator>, options: GenerateOptions) -> Self {
        Self { generator, options }
    }

    /// Keyword screen; independent of the model's answer.
    pub fn flags_for(draft: &str) -> Vec<String> {
        let lower = draft.to_lowercase();
        if SELF_HARM_TERMS.iter().any(|term| lower.contains(term)) {
            vec!["possible self-harm".to_string()]
        } else {
            Vec::new()
        }
    }

    fn flags_of(state: &RunState) -> Vec<String> {
        state
            .field("safety_flags")
            .and_then(Value::as_array)
            .map(|flags| {
                flags
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Stage for SafetyGuardian {
    fn name(&self) -> &str {
        "SafetyGuardian"
    }

    async fn run(&self, mut state: RunState) -> Result<RunState, StageError> {
        let prompt = format!(
            "Check the following draft for potential safety issues (self-harm, medical advice, instructions to harm):\n\n{}\n\nReturn a short safety summary.",
            state.current_draft_text
        );
        let summary = self.generator.generate(&prompt, &self.options).await?;

        let flags = Self::flags_for(&state.current_draft_text);
        let score = if flags.is_empty() { CLEAN_SCORE } else { FLAGGED_SCORE };

        state.set_field("safety_flags", flags);
        state.set_field("safety_check_text", summary.trim());
        state.set_field("safety_score", score);
        Ok(state)
    }

    fn completion_note(&self, state: &RunState) -> String {
        format!("Safety result: {:?}", Self::flags_of(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::MockGenerator;

    fn guardian() -> SafetyGuardian {
        SafetyGuardian::new(Arc::new(MockGenerator::new()), GenerateOptions::default())
    }

    #[test]
    fn test_keyword_flags() {
        assert!(SafetyGuardian::flags_for("Take a slow breath").is_empty());
        assert_eq!(
            SafetyGuardian::flags_for("Thoughts of Self-Harm are common"),
            vec!["possible self-harm"]
        );
        assert_eq!(SafetyGuardian::flags_for("suicide hotline").len(), 1);
    }

    #[tokio::test]
    async fn test_clean_draft() {
        let mut state = RunState::new("r", "sleep");
        state.push_draft("Write down three worries before bed.");

        let stage = guardian();
        let state = stage.run(state).await.unwrap();

        assert_eq!(state.field("safety_score").and_then(Value::as_f64), Some(0.95));
        assert!(state.field_str("safety_check_text").unwrap().starts_with("[MOCK]"));
        assert_eq!(stage.completion_note(&state), "Safety result: []");
    }

    #[tokio::test]
    async fn test_flagged_draft() {
        let mut state = RunState::new("r", "sleep");
        state.push_draft("If you think about suicide, call someone.");

        let stage = guardian();
        let state = stage.run(state).await.unwrap();

        assert_eq!(state.field("safety_score").and_then(Value::as_f64), Some(0.2));
        assert_eq!(
            stage.completion_note(&state),
            "Safety result: [\"possible self-harm\"]"
        );
    }
}
