//! OpenAI-compatible client implementation.
//!
//! Works against OpenAI itself and any server exposing the same
//! `/chat/completions` endpoint (vLLM, LM Studio, OpenRouter, ...).
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::remote::OpenAiClient;
//! use llm::{GenerateOptions, Generator, RemoteLlmConfig};
//!
//! let config = RemoteLlmConfig::from_env("OPENAI_API_KEY", "https://api.openai.com/v1", "gpt-4o-mini")?;
//! let client = OpenAiClient::new(config)?;
//!
//! let text = client.generate("Hello!", &GenerateOptions::default()).await?;
//! ```

use crate::config::RemoteLlmConfig;
use crate::error::{LlmError, Result};
use crate::generator::{with_retries, GenerateOptions, Generator};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// OpenAI API client.
#[derive(Clone)]
pub struct OpenAiClient {
    config: RemoteLlmConfig,
    client: Client,
}

impl OpenAiClient {
    /// Create a new OpenAI client with the given configuration.
    pub fn new(config: RemoteLlmConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::ApiKeyNotFound("api_key is empty".to_string()));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn build_request(&self, prompt: &str, options: &GenerateOptions) -> OpenAiRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &options.system {
            messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
            });
        }
        messages.push(OpenAiMessage {
            role: "user".to_string(),
            content: Some(prompt.to_string()),
        });

        OpenAiRequest {
            model: self.config.model.clone(),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        }
    }

    async fn complete_once(&self, body: &OpenAiRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let mut req = self
            .client
            .post(&url)
            .json(body)
            .header("Authorization", format!("Bearer {}", self.config.api_key));

        if let Some(org) = &self.config.organization {
            req = req.header("OpenAI-Organization", org);
        }

        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status("OpenAI", status, error_text));
        }

        let openai_resp: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Self::extract_text(openai_resp)
    }

    fn extract_text(resp: OpenAiResponse) -> Result<String> {
        if let Some(usage) = &resp.usage {
            debug!(
                model = %resp.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "OpenAI response received"
            );
        }

        resp.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| LlmError::InvalidResponse("response contained no choices".to_string()))
    }
}

#[async_trait]
impl Generator for OpenAiClient {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
        let body = self.build_request(prompt, options);
        with_retries("openai", self.config.max_retries, || self.complete_once(&body)).await
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}
