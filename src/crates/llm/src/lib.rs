//! Text generation backends for foundry stages.
//!
//! Every stage that needs model output goes through one operation,
//! [`Generator::generate`]. This crate provides the implementations:
//!
//! - **Mock** - deterministic echo of the prompt, the default; no network
//! - **Ollama** - local server via `/api/chat` (feature `local`)
//! - **OpenAI** - any OpenAI-compatible `/chat/completions` API (feature `remote`)
//!
//! Backend outages surface as [`LlmError`]; callers decide whether that fails
//! the stage or gets recorded as text.
//!
//! # Example
//!
//! ```rust
//! use llm::{GenerateOptions, Generator, MockGenerator};
//!
//! # tokio_test_block(async {
//! let generator = MockGenerator::new();
//! let text = generator
//!     .generate("Create a short CBT exercise", &GenerateOptions::default())
//!     .await
//!     .unwrap();
//! assert!(text.starts_with("[MOCK]"));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod config;
pub mod error;
pub mod generator;
pub mod mock;

#[cfg(feature = "local")]
pub mod local;

#[cfg(feature = "remote")]
pub mod remote;

// Re-export commonly used types
pub use config::{LlmMode, LocalLlmConfig, RemoteLlmConfig};
pub use error::{LlmError, Result};
pub use generator::{build_generator, GenerateOptions, Generator};
pub use mock::MockGenerator;
