//! Ollama client implementation.
//!
//! Talks to a local Ollama server through the non-streaming `/api/chat`
//! endpoint.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::local::OllamaClient;
//! use llm::{GenerateOptions, Generator, LocalLlmConfig};
//!
//! let config = LocalLlmConfig::new("http://localhost:11434", "llama3");
//! let client = OllamaClient::new(config)?;
//!
//! let text = client.generate("Hello!", &GenerateOptions::default()).await?;
//! ```

use crate::config::LocalLlmConfig;
use crate::error::{LlmError, Result};
use crate::generator::{with_retries, GenerateOptions, Generator};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ollama client for local LLM inference.
#[derive(Clone)]
pub struct OllamaClient {
    config: LocalLlmConfig,
    client: Client,
}

impl OllamaClient {
    /// Create a new Ollama client with the given configuration.
    pub fn new(config: LocalLlmConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Model requests are sent to
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Check if Ollama server is running.
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url.trim_end_matches('/'));
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn build_request(&self, prompt: &str, options: &GenerateOptions) -> OllamaRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &options.system {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(OllamaMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let sampling = OllamaOptions {
            temperature: options.temperature,
            num_predict: options.max_tokens,
        };

        OllamaRequest {
            model: self.config.model.clone(),
            messages,
            stream: false,
            options: if sampling.is_empty() { None } else { Some(sampling) },
        }
    }

    async fn chat_once(&self, body: &OllamaRequest) -> Result<String> {
        let url = format!("{}/api/chat", self.config.base_url.trim_end_matches('/'));

        let response = self.client.post(&url).json(body).send().await.map_err(|e| {
            if e.is_connect() {
                LlmError::ServiceUnavailable(format!("Ollama not reachable at {}", self.config.base_url))
            } else {
                LlmError::HttpError(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status("Ollama", status, error_text));
        }

        let ollama_resp: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        debug!(
            model = %ollama_resp.model,
            prompt_tokens = ollama_resp.prompt_eval_count.unwrap_or(0),
            output_tokens = ollama_resp.eval_count.unwrap_or(0),
            "Ollama response received"
        );

        Ok(ollama_resp.message.content)
    }
}

#[async_trait]
impl Generator for OllamaClient {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
        let body = self.build_request(prompt, options);
        with_retries("ollama", self.config.max_retries, || self.chat_once(&body)).await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    async fn is_available(&self) -> bool {
        self.check_health().await
    }
}

// Ollama API types
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

impl OllamaOptions {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.num_predict.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    model: String,
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<usize>,
    #[serde(default)]
    eval_count: Option<usize>,
}
