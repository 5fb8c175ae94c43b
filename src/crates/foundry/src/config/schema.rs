//! Configuration schema for foundry

use crate::resume::{ResumeAction, ResumePolicy};
use llm::{build_generator, GenerateOptions, Generator, LlmMode, LocalLlmConfig, RemoteLlmConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default Ollama endpoint
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Default OpenAI-compatible endpoint
pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";

/// Main foundry configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FoundryConfig {
    /// Checkpoint database
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Generation backend
    #[serde(default)]
    pub llm: LlmConfig,

    /// Pipeline execution
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path (relative to ~/.foundry or absolute)
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "foundry.db".to_string(),
        }
    }
}

/// Generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    /// "mock", "ollama" or "openai"
    pub mode: String,

    /// Model name
    pub model: String,

    /// API base URL. Ollama defaults to localhost, OpenAI to the public API.
    pub api_base: Option<String>,

    /// API key (supports environment variable interpolation)
    pub api_key: Option<String>,

    /// Maximum tokens to generate per stage call
    pub max_tokens: u32,

    /// Temperature for generation (0.0-1.0)
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            mode: "mock".to_string(),
            model: "llama3".to_string(),
            api_base: None,
            api_key: None,
            max_tokens: 512,
            temperature: None,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// Parsed mode; unknown names fall back to mock.
    pub fn mode(&self) -> LlmMode {
        LlmMode::from_name_lenient(&self.mode)
    }

    /// Options passed to every stage call
    pub fn generate_options(&self) -> GenerateOptions {
        let options = GenerateOptions::default().with_max_tokens(self.max_tokens);
        match self.temperature {
            Some(t) => options.with_temperature(t),
            None => options,
        }
    }

    /// Generator selected by `mode`.
    pub fn generator(&self) -> llm::Result<Arc<dyn Generator>> {
        build_generator(self.mode(), self.local(), self.remote())
    }

    pub fn local(&self) -> LocalLlmConfig {
        let base = self
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string());
        LocalLlmConfig::new(base, self.model.clone()).with_timeout(Duration::from_secs(self.timeout_secs))
    }

    /// Remote settings, when a key is configured
    pub fn remote(&self) -> Option<RemoteLlmConfig> {
        let key = self.api_key.clone().filter(|k| !k.is_empty())?;
        let base = self
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE.to_string());
        Some(
            RemoteLlmConfig::new(key, base, self.model.clone())
                .with_timeout(Duration::from_secs(self.timeout_secs)),
        )
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Progress feed polling interval in milliseconds
    pub poll_interval_ms: u64,

    /// Probe for an external graph engine at start-up
    pub use_external_engine: bool,

    /// Resume-point overrides
    pub resume: ResumeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            use_external_engine: true,
            resume: ResumeConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Overrides layered onto [`ResumePolicy::default`]
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ResumeConfig {
    /// Action for checkpoint names that are neither stages nor listed
    pub unknown: Option<ResumeAction>,

    /// Per checkpoint-name actions
    pub checkpoints: HashMap<String, ResumeAction>,
}

impl ResumeConfig {
    pub fn policy(&self) -> ResumePolicy {
        let mut policy = ResumePolicy::default();
        if let Some(unknown) = self.unknown {
            policy = policy.with_unknown(unknown);
        }
        for (name, action) in &self.checkpoints {
            policy = policy.with_checkpoint(name.clone(), *action);
        }
        policy
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive, e.g. "info" or "foundry=debug"
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl FoundryConfig {
    /// Directory holding the user config and relative database paths
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".foundry")
    }

    /// Resolve environment variables in configuration values
    ///
    /// Supports ${VAR_NAME} syntax in `api_key` and `api_base`
    pub fn resolve_env_vars(&mut self) {
        if let Some(ref api_key) = self.llm.api_key {
            self.llm.api_key = Some(Self::expand_env_var(api_key));
        }

        if let Some(ref api_base) = self.llm.api_base {
            self.llm.api_base = Some(Self::expand_env_var(api_base));
        }
    }

    fn expand_env_var(value: &str) -> String {
        match value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
            Some(var_name) => std::env::var(var_name).unwrap_or_else(|_| value.to_string()),
            None => value.to_string(),
        }
    }

    /// Apply process environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`.
    ///
    /// `LLM_MODE`, `OLLAMA_HOST`, `OLLAMA_MODEL`, `DATABASE_URL` and
    /// `USE_EXTERNAL_ENGINE` are recognised.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup("LLM_MODE") {
            self.llm.mode = mode.trim().to_lowercase();
        }

        if self.llm.mode() == LlmMode::Ollama {
            if let Some(host) = lookup("OLLAMA_HOST") {
                self.llm.api_base = Some(host);
            }
            if let Some(model) = lookup("OLLAMA_MODEL") {
                self.llm.model = model;
            }
        }

        // A URL from the environment names a file relative to the working
        // directory, not to ~/.foundry
        if let Some(url) = lookup("DATABASE_URL") {
            let path = PathBuf::from(sqlite_path(&url));
            let path = match std::env::current_dir() {
                Ok(cwd) if path.is_relative() => cwd.join(path),
                _ => path,
            };
            self.database.path = path.to_string_lossy().into_owned();
        }

        if let Some(flag) = lookup("USE_EXTERNAL_ENGINE") {
            self.pipeline.use_external_engine = matches!(
                flag.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }

    /// Get the resolved database path
    ///
    /// If path is relative, resolves it relative to ~/.foundry
    pub fn database_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.database.path);

        if path.is_absolute() {
            path
        } else {
            Self::home_dir().join(path)
        }
    }
}

/// Strip a `sqlite:` URL scheme down to the file path.
fn sqlite_path(url: &str) -> &str {
    url.strip_prefix("sqlite:///")
        .or_else(|| url.strip_prefix("sqlite://"))
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}
