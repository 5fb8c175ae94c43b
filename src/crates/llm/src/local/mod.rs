//! Local LLM provider implementations.
//!
//! Providers for servers on localhost or the local network. They need no API
//! key and keep prompts on the machine.

pub mod ollama;

pub use ollama::OllamaClient;
