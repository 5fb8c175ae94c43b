//! Backend selection and client configuration.

use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which generation backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmMode {
    /// Deterministic offline responses
    #[default]
    Mock,
    /// Local Ollama server
    Ollama,
    /// Any OpenAI-compatible chat completions endpoint
    OpenAi,
}

impl LlmMode {
    /// Parse a mode name, falling back to [`LlmMode::Mock`] for anything unknown.
    pub fn from_name_lenient(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            tracing::warn!(mode = name, "Unknown LLM mode, using mock backend");
            LlmMode::Mock
        })
    }
}

impl FromStr for LlmMode {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" | "" => Ok(LlmMode::Mock),
            "ollama" => Ok(LlmMode::Ollama),
            "openai" => Ok(LlmMode::OpenAi),
            other => Err(LlmError::ConfigError(format!("unknown LLM mode '{}'", other))),
        }
    }
}

impl fmt::Display for LlmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LlmMode::Mock => "mock",
            LlmMode::Ollama => "ollama",
            LlmMode::OpenAi => "openai",
        };
        f.write_str(name)
    }
}

/// Configuration for local LLM servers (Ollama).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalLlmConfig {
    /// Base URL for the local LLM server, e.g. `http://localhost:11434`.
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Maximum retries for failed requests.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl LocalLlmConfig {
    /// Create a new local LLM configuration.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Configuration for hosted, key-authenticated APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API, e.g. `https://api.openai.com/v1`.
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Maximum retries for failed requests.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Organization ID (optional, for providers that support it).
    pub organization: Option<String>,
}

impl RemoteLlmConfig {
    /// Create a new remote LLM configuration.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            organization: None,
        }
    }

    /// Create configuration reading the key from an environment variable.
    pub fn from_env(
        env_var: &str,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .map_err(|_| LlmError::ApiKeyNotFound(format!("Environment variable: {}", env_var)))?;

        Ok(Self::new(api_key, base_url, model))
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the organization ID.
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_retries() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("ollama".parse::<LlmMode>().unwrap(), LlmMode::Ollama);
        assert_eq!("OpenAI".parse::<LlmMode>().unwrap(), LlmMode::OpenAi);
        assert_eq!("".parse::<LlmMode>().unwrap(), LlmMode::Mock);
        assert!("transformers".parse::<LlmMode>().is_err());
        assert_eq!(LlmMode::from_name_lenient("transformers"), LlmMode::Mock);
        assert_eq!(LlmMode::OpenAi.to_string(), "openai");
    }

    #[test]
    fn test_local_config_builder() {
        let config = LocalLlmConfig::new("http://localhost:11434", "llama3")
            .with_timeout(Duration::from_secs(30))
            .with_max_retries(5);

        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.model, "llama3");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 5);
    }

    #[test]
    fn test_remote_config_builder() {
        let config = RemoteLlmConfig::new("test-key", "https://api.openai.com/v1", "gpt-4o-mini")
            .with_timeout(Duration::from_secs(120))
            .with_organization("org-123");

        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.organization, Some("org-123".to_string()));
    }

    #[test]
    fn test_remote_config_missing_env() {
        let err = RemoteLlmConfig::from_env("FOUNDRY_TEST_KEY_THAT_IS_NOT_SET", "http://x", "m")
            .unwrap_err();
        assert!(err.is_auth_error());
    }
}
