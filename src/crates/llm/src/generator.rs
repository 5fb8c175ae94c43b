//! The single text-generation operation stages depend on.

use crate::config::{LlmMode, LocalLlmConfig, RemoteLlmConfig};
use crate::error::{LlmError, Result};
use crate::mock::MockGenerator;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-call generation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    /// Optional system prompt sent ahead of the user prompt
    pub system: Option<String>,
    /// Upper bound on generated tokens
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            system: None,
            max_tokens: Some(512),
            temperature: None,
        }
    }
}

impl GenerateOptions {
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A text generation backend.
///
/// Implementations may be slow or unavailable; failures are reported as
/// [`LlmError`] and never panic.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce text for `prompt`.
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String>;

    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Whether the backend is reachable. Defaults to `true`.
    async fn is_available(&self) -> bool {
        true
    }
}

/// Build the generator for `mode`.
///
/// `remote` is required for [`LlmMode::OpenAi`].
pub fn build_generator(
    mode: LlmMode,
    local: LocalLlmConfig,
    remote: Option<RemoteLlmConfig>,
) -> Result<Arc<dyn Generator>> {
    debug!(%mode, "Building generator");
    match mode {
        LlmMode::Mock => Ok(Arc::new(MockGenerator::new())),
        #[cfg(feature = "local")]
        LlmMode::Ollama => Ok(Arc::new(crate::local::OllamaClient::new(local)?)),
        #[cfg(feature = "remote")]
        LlmMode::OpenAi => {
            let remote = remote.ok_or_else(|| {
                LlmError::ConfigError("openai mode requires an API key and base URL".to_string())
            })?;
            Ok(Arc::new(crate::remote::OpenAiClient::new(remote)?))
        }
        #[allow(unreachable_patterns)]
        other => Err(LlmError::ConfigError(format!(
            "LLM mode '{}' is not compiled into this build",
            other
        ))),
    }
}

/// Run `call`, retrying retryable failures up to `max_retries` extra times.
pub(crate) async fn with_retries<F, Fut>(provider: &str, max_retries: u32, mut call: F) -> Result<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                warn!(provider, attempt, error = %e, "Generation failed, retrying");
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
            }
            Err(e) => return Err(e),
        }
    }
}
