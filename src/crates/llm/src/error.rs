//! Error types for generation backends.

use thiserror::Error;

/// Result type for LLM operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur when calling a generation backend.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to serialize/deserialize data.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// API authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// API key not found in environment.
    #[error("API key not found: {0}")]
    ApiKeyNotFound(String),

    /// Provider service unavailable (e.g., Ollama not running).
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid response from provider.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// General provider error.
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LlmError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::HttpError(e) => e.is_connect() || e.is_timeout(),
            LlmError::ServiceUnavailable(_) | LlmError::RateLimitExceeded(_) => true,
            _ => false,
        }
    }

    /// Check if this error is due to authentication.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            LlmError::AuthenticationError(_) | LlmError::ApiKeyNotFound(_)
        )
    }

    /// Map a non-success HTTP status to the matching variant.
    pub(crate) fn from_status(provider: &str, status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            401 | 403 => LlmError::AuthenticationError(body),
            429 => LlmError::RateLimitExceeded(body),
            502..=504 => LlmError::ServiceUnavailable(format!("{} returned {}", provider, status)),
            _ => LlmError::ProviderError(format!("{} API error {}: {}", provider, status, body)),
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_mapping() {
        let err = LlmError::from_status("OpenAI", StatusCode::UNAUTHORIZED, "bad key".into());
        assert!(err.is_auth_error());

        let err = LlmError::from_status("OpenAI", StatusCode::TOO_MANY_REQUESTS, "slow".into());
        assert!(matches!(err, LlmError::RateLimitExceeded(_)));
        assert!(err.is_retryable());

        let err = LlmError::from_status("Ollama", StatusCode::BAD_GATEWAY, String::new());
        assert!(matches!(err, LlmError::ServiceUnavailable(_)));

        let err = LlmError::from_status("Ollama", StatusCode::NOT_FOUND, "model".into());
        assert!(matches!(err, LlmError::ProviderError(ref m) if m.contains("404")));
        assert!(!err.is_retryable());
    }
}
