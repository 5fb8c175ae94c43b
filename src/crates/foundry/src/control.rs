//! Run control operations
//!
//! [`RunController`] layers the human-facing operations on top of the
//! orchestrator: starting a run, approving a paused run, reading status and
//! history, generating a final summary and watching progress.

use crate::config::FoundryConfig;
use crate::engine::EngineCatalog;
use crate::error::{FoundryError, Result};
use crate::executor::SequentialExecutor;
use crate::feed::{ProgressFeed, DEFAULT_POLL_INTERVAL};
use crate::orchestrator::Orchestrator;
use crate::stages::StageSequence;
use crate::state::{RunState, RunStatus};
use chrono::{DateTime, Utc};
use foundry_checkpoint::{CheckpointStore, SqliteCheckpointStore};
use llm::{GenerateOptions, Generator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Checkpoint stage name of a human approval
pub const HUMAN_CHECKPOINT: &str = "human";

/// Checkpoint stage name of a generated summary
pub const SUMMARY_CHECKPOINT: &str = "summary_agent";

/// State field holding the generated summary
pub const SUMMARY_FIELD: &str = "final_summary";

const SUMMARY_MAX_TOKENS: u32 = 256;

/// One line of a run's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "agent")]
    pub stage_name: String,
    pub timestamp: DateTime<Utc>,
    pub note: String,
}

/// Human-facing operations over an [`Orchestrator`].
#[derive(Clone)]
pub struct RunController {
    orchestrator: Arc<Orchestrator>,
    generator: Arc<dyn Generator>,
    options: GenerateOptions,
    poll_interval: Duration,
}

impl RunController {
    pub fn new(orchestrator: Arc<Orchestrator>, generator: Arc<dyn Generator>) -> Self {
        Self {
            orchestrator,
            generator,
            options: GenerateOptions::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Wire the whole pipeline from configuration.
    ///
    /// Opens the SQLite store at [`FoundryConfig::database_path`], builds the
    /// configured generator and probes `catalog` unless the external engine is
    /// disabled.
    pub async fn open(config: &FoundryConfig, catalog: &EngineCatalog) -> Result<Self> {
        let path = config.database_path();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                FoundryError::config(format!("Cannot create {}: {}", parent.display(), e))
            })?;
        }
        let store: Arc<dyn CheckpointStore> = Arc::new(SqliteCheckpointStore::open(&path).await?);
        info!(path = %path.display(), "Checkpoint store opened");

        Self::with_store(config, store, catalog)
    }

    /// Like [`RunController::open`] over an existing store.
    pub fn with_store(
        config: &FoundryConfig,
        store: Arc<dyn CheckpointStore>,
        catalog: &EngineCatalog,
    ) -> Result<Self> {
        let generator = config.llm.generator()?;
        let options = config.llm.generate_options();
        let sequence = StageSequence::cbt(generator.clone(), options.clone());
        let executor = SequentialExecutor::new(store, sequence).with_policy(config.pipeline.resume.policy());

        let orchestrator = if config.pipeline.use_external_engine {
            Orchestrator::new(executor, catalog)
        } else {
            Orchestrator::sequential(executor)
        };

        Ok(Self::new(Arc::new(orchestrator), generator)
            .with_options(options)
            .with_poll_interval(config.pipeline.poll_interval()))
    }

    /// Base options for summary generation.
    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Start a run for a non-empty intent.
    pub async fn start(&self, intent: &str) -> Result<String> {
        if intent.trim().is_empty() {
            return Err(FoundryError::invalid_input("intent required"));
        }
        self.orchestrator.start_run(intent).await
    }

    /// Continue a run from its latest checkpoint.
    pub async fn resume(&self, run_id: &str) -> Result<RunState> {
        self.orchestrator.resume_run(run_id).await
    }

    /// Approve the run's current draft, or `text` in its place, and resume.
    ///
    /// Only a run paused at the human hand-off can be approved; anything else
    /// is rejected with [`FoundryError::InvalidInput`] and nothing is written.
    #[instrument(skip(self, text))]
    pub async fn approve(&self, run_id: &str, text: Option<String>) -> Result<RunState> {
        let executor = self.orchestrator.executor();
        let (_, mut state) = executor.latest_state(run_id).await?;

        if state.status != RunStatus::PausedForHuman {
            warn!(run_id, status = %state.status, "Refusing to approve a run that is not paused");
            return Err(FoundryError::invalid_input(format!(
                "run {} is {}, only a run paused for human review can be approved",
                run_id, state.status
            )));
        }

        state.approved_text = Some(text.unwrap_or_else(|| state.current_draft_text.clone()));
        state.status = RunStatus::ApprovedByHuman;
        executor
            .checkpoint(&state, HUMAN_CHECKPOINT, "approved by human")
            .await?;
        info!(run_id, "Run approved");

        self.orchestrator.resume_run(run_id).await
    }

    /// Latest state of the run.
    pub async fn status(&self, run_id: &str) -> Result<RunState> {
        let (_, state) = self.orchestrator.executor().latest_state(run_id).await?;
        Ok(state)
    }

    /// Ordered checkpoint history.
    pub async fn history(&self, run_id: &str) -> Result<Vec<HistoryEntry>> {
        let checkpoints = self.orchestrator.store().all(run_id).await?;
        if checkpoints.is_empty() {
            return Err(FoundryError::RunNotFound(run_id.to_string()));
        }

        Ok(checkpoints
            .into_iter()
            .map(|c| HistoryEntry {
                stage_name: c.stage_name,
                timestamp: c.timestamp,
                note: c.note,
            })
            .collect())
    }

    /// Short reviewer-facing summary of the final draft.
    ///
    /// Generated once and persisted under `final_summary`; later calls return
    /// the stored text. A generation failure is stored as the summary text
    /// rather than returned.
    #[instrument(skip(self))]
    pub async fn summarize(&self, run_id: &str) -> Result<String> {
        let executor = self.orchestrator.executor();
        let (_, mut state) = executor.latest_state(run_id).await?;

        if let Some(existing) = state.field_str(SUMMARY_FIELD).filter(|s| !s.is_empty()) {
            return Ok(existing.to_string());
        }

        let prompt = summary_prompt(&state.intent_text, state.effective_text());
        let options = self.options.clone().with_max_tokens(SUMMARY_MAX_TOKENS);
        let summary = match self.generator.generate(&prompt, &options).await {
            Ok(text) => strip_mock_prefix(&text),
            Err(e) => {
                warn!(run_id, error = %e, "Summary generation failed");
                format!("[error generating summary] {}", e)
            }
        };

        state.set_field(SUMMARY_FIELD, summary.clone());
        executor
            .checkpoint(&state, SUMMARY_CHECKPOINT, "final summary generated")
            .await?;
        Ok(summary)
    }

    /// Progress feed for the run at the configured poll interval.
    pub fn watch(&self, run_id: &str) -> ProgressFeed {
        ProgressFeed::new(self.orchestrator.store().clone(), run_id).with_interval(self.poll_interval)
    }
}

fn summary_prompt(intent: &str, draft: &str) -> String {
    format!(
        "Produce a short (3-5 line) human-friendly summary of the final CBT exercise.\n\n\
         Intent: {}\n\n\
         Final draft:\n{}\n\n\
         Output a concise summary suitable for a clinician reviewer.",
        intent, draft
    )
}

/// Drop the mock backend's `[MOCK] ...:` lead-in.
fn strip_mock_prefix(text: &str) -> String {
    if !text.starts_with("[MOCK]") {
        return text.to_string();
    }
    match text.split_once(':') {
        Some((_, rest)) => rest.trim().to_string(),
        None => text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_mock_prefix() {
        assert_eq!(
            strip_mock_prefix("[MOCK] Generated response for prompt: Produce a summary"),
            "Produce a summary"
        );
        assert_eq!(strip_mock_prefix("[MOCK] no colon"), "[MOCK] no colon");
        assert_eq!(strip_mock_prefix("Real: summary"), "Real: summary");
    }

    #[test]
    fn test_summary_prompt() {
        let prompt = summary_prompt("sleep", "Breathe slowly.");
        assert!(prompt.starts_with("Produce a short (3-5 line)"));
        assert!(prompt.contains("Intent: sleep\n\n"));
        assert!(prompt.contains("Final draft:\nBreathe slowly.\n\n"));
        assert!(prompt.ends_with("suitable for a clinician reviewer."));
    }
}
