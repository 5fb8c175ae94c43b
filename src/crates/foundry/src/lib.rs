//! # Foundry - Resumable CBT exercise pipeline
//!
//! Foundry runs a fixed sequence of content-generating stages over a shared run
//! state, checkpoints after every stage, pauses for human approval and resumes
//! from the last checkpoint.
//!
//! ## Features
//!
//! - **Checkpoint-addressed runs** - a run is the ordered list of its checkpoints
//! - **Deterministic resume** - explicit, configurable resume-point policy
//! - **Optional external engine** - probed once, with per-call fallback to the
//!   in-process executor
//! - **Live progress feed** - change-detection polling over the checkpoint store
//! - **SQLite persistence** - runs survive process restarts
//! - **Dual-location config** - user-level and project-level `foundry.toml`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use foundry::{EngineCatalog, FoundryConfig, RunController};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = FoundryConfig::default();
//! let controller = RunController::open(&config, &EngineCatalog::new()).await?;
//!
//! let run_id = controller.start("help with sleep").await?;
//! let paused = controller.status(&run_id).await?;
//! println!("{} is {}", run_id, paused.status);
//!
//! let done = controller.approve(&run_id, None).await?;
//! println!("{}", done.status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod control;
pub mod engine;
pub mod events;
pub mod executor;
pub mod feed;
pub mod logging;
pub mod orchestrator;
pub mod resume;
pub mod stages;
pub mod state;

mod error;

pub use config::{load_config, ConfigLoader, FoundryConfig};
pub use control::{HistoryEntry, RunController};
pub use engine::{EngineCatalog, EngineError};
pub use error::{FoundryError, Result};
pub use events::ProgressEvent;
pub use executor::{PipelineBackend, SequentialExecutor};
pub use feed::ProgressFeed;
pub use orchestrator::Orchestrator;
pub use resume::{ResumeAction, ResumePoint, ResumePolicy};
pub use stages::{Stage, StageError, StageSequence};
pub use state::{DraftVersion, RunState, RunStatus};

pub use foundry_checkpoint::{Checkpoint, CheckpointId, CheckpointStore};
