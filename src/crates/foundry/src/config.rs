//! Configuration management for foundry
//!
//! Supports dual-location configuration:
//! - User-level: ~/.foundry/foundry.toml
//! - Project-level: ./.foundry/foundry.toml
//!
//! Project-level config overrides user-level config, and environment
//! variables override both.

mod loader;
mod schema;

pub use loader::{ConfigLoader, CONFIG_FILE_NAME};
pub use schema::{
    DatabaseConfig, FoundryConfig, LlmConfig, LogFormat, LoggingConfig, PipelineConfig,
    ResumeConfig, DEFAULT_OLLAMA_HOST, DEFAULT_OPENAI_BASE,
};

use crate::Result;

/// Load configuration from both locations plus the environment.
pub async fn load_config() -> Result<FoundryConfig> {
    ConfigLoader::new().load().await
}
