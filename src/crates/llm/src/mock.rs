//! Deterministic offline generator.

use crate::error::Result;
use crate::generator::{GenerateOptions, Generator};
use async_trait::async_trait;

const PREVIEW_LIMIT: usize = 200;
const PREVIEW_KEEP: usize = 197;

/// Echoes a preview of the prompt, so runs are reproducible without a model.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator;

impl MockGenerator {
    pub fn new() -> Self {
        Self
    }

    /// The exact text returned for `prompt`.
    pub fn response_for(prompt: &str) -> String {
        let preview = if prompt.chars().count() < PREVIEW_LIMIT {
            prompt.to_string()
        } else {
            let mut cut: String = prompt.chars().take(PREVIEW_KEEP).collect();
            cut.push_str("...");
            cut
        };
        format!("[MOCK] Generated response for prompt: {}", preview)
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, prompt: &str, _options: &GenerateOptions) -> Result<String> {
        Ok(Self::response_for(prompt))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
