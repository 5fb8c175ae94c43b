//! Configuration loader with dual-location support
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.foundry/foundry.toml
//! 3. Project-level config: ./.foundry/foundry.toml
//! 4. Environment overrides
//!
//! Files are merged table by table, so a project file only needs the keys it
//! changes.

use crate::config::schema::FoundryConfig;
use crate::error::{FoundryError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use toml::{Table, Value};
use tracing::{debug, info};

/// File name looked up in both config directories
pub const CONFIG_FILE_NAME: &str = "foundry.toml";

/// Configuration loader that handles both user and project configs
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_config_path: PathBuf,
    project_config_path: PathBuf,
    use_env: bool,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            user_config_path: FoundryConfig::home_dir().join(CONFIG_FILE_NAME),
            project_config_path: PathBuf::from(".foundry").join(CONFIG_FILE_NAME),
            use_env: true,
        }
    }

    /// Loader reading the two given files instead of the standard locations
    pub fn with_paths(user: impl Into<PathBuf>, project: impl Into<PathBuf>) -> Self {
        Self {
            user_config_path: user.into(),
            project_config_path: project.into(),
            use_env: true,
        }
    }

    /// Skip process environment overrides.
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Load and merge every layer.
    pub async fn load(&self) -> Result<FoundryConfig> {
        let mut merged = Table::new();

        for path in [&self.user_config_path, &self.project_config_path] {
            match Self::read_table(path).await? {
                Some(table) => {
                    debug!(path = %path.display(), "Loaded config layer");
                    merge_tables(&mut merged, table);
                }
                None => debug!(path = %path.display(), "Config file not found"),
            }
        }

        let mut config: FoundryConfig = Value::Table(merged)
            .try_into()
            .map_err(|e| FoundryError::config(format!("Invalid configuration: {}", e)))?;

        config.resolve_env_vars();
        if self.use_env {
            config.apply_env_overrides();
        }

        info!(llm_mode = %config.llm.mode(), database = %config.database.path, "Configuration loaded");
        Ok(config)
    }

    /// Parse one file; `None` when it does not exist.
    async fn read_table(path: &Path) -> Result<Option<Table>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            FoundryError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let table = content.parse::<Table>().map_err(|e| {
            FoundryError::config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        Ok(Some(table))
    }

    pub fn user_config_path(&self) -> &Path {
        &self.user_config_path
    }

    pub fn project_config_path(&self) -> &Path {
        &self.project_config_path
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursively merge `overlay` into `base`; overlay values win.
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => merge_tables(existing, incoming),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use crate::resume::ResumeAction;
    use llm::LlmMode;
    use tempfile::TempDir;

    #[test]
    fn test_config_paths() {
        let loader = ConfigLoader::new();
        assert!(loader.user_config_path().ends_with(".foundry/foundry.toml"));
        assert!(loader.project_config_path().ends_with(".foundry/foundry.toml"));
    }

    #[tokio::test]
    async fn test_load_returns_defaults_when_no_files() {
        let loader = ConfigLoader::with_paths("/nonexistent/user.toml", "/nonexistent/project.toml")
            .without_env();
        let config = loader.load().await.unwrap();
        assert_eq!(config, FoundryConfig::default());
    }

    #[tokio::test]
    async fn test_project_overrides_user_key_by_key() {
        let temp_dir = TempDir::new().unwrap();
        let user = temp_dir.path().join("user.toml");
        let project = temp_dir.path().join("project.toml");

        fs::write(
            &user,
            r#"
[llm]
mode = "ollama"
model = "llama3"
max_tokens = 1024

[pipeline.resume.checkpoints]
human = "restart"
"#,
        )
        .await
        .unwrap();
        fs::write(
            &project,
            r#"
[llm]
model = "mistral"

[logging]
format = "pretty"

[database]
path = "/tmp/project.db"
"#,
        )
        .await
        .unwrap();

        let config = ConfigLoader::with_paths(&user, &project)
            .without_env()
            .load()
            .await
            .unwrap();

        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.mode(), LlmMode::Ollama);
        assert_eq!(config.llm.max_tokens, 1024);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.database.path, "/tmp/project.db");
        assert_eq!(
            config.pipeline.resume.checkpoints.get("human"),
            Some(&ResumeAction::Restart)
        );
    }

    #[tokio::test]
    async fn test_invalid_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let user = temp_dir.path().join("user.toml");
        fs::write(&user, "[llm\nmode = ").await.unwrap();

        let err = ConfigLoader::with_paths(&user, temp_dir.path().join("none.toml"))
            .without_env()
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, FoundryError::Config(_)));
    }

    #[tokio::test]
    async fn test_wrong_type_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let user = temp_dir.path().join("user.toml");
        fs::write(&user, "[pipeline]\npoll_interval_ms = \"fast\"\n").await.unwrap();

        let result = ConfigLoader::with_paths(&user, temp_dir.path().join("none.toml"))
            .without_env()
            .load()
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_tables() {
        let mut base: Table = "a = 1\n[t]\nx = 1\ny = 2\n".parse().unwrap();
        let overlay: Table = "b = 2\n[t]\ny = 3\n".parse().unwrap();
        merge_tables(&mut base, overlay);

        assert_eq!(base["a"].as_integer(), Some(1));
        assert_eq!(base["b"].as_integer(), Some(2));
        assert_eq!(base["t"]["x"].as_integer(), Some(1));
        assert_eq!(base["t"]["y"].as_integer(), Some(3));
    }
}
