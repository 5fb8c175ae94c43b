//! Remote LLM provider implementations.
//!
//! Providers for hosted APIs that authenticate with an API key.

pub mod openai;

pub use openai::OpenAiClient;
