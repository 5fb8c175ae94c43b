//! Live progress feed
//!
//! [`ProgressFeed`] polls `latest(run_id)` on a fixed interval and yields a
//! [`ProgressEvent`] whenever the latest checkpoint id changes. The stream is
//! infinite; dropping it is the only way to stop it.

use crate::events::ProgressEvent;
use foundry_checkpoint::{CheckpointId, CheckpointStore};
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Default polling cadence
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Change-detection feed over one run's checkpoints.
///
/// ```rust,no_run
/// use foundry::ProgressFeed;
/// use foundry_checkpoint::InMemoryCheckpointStore;
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # async fn example() {
/// let store = Arc::new(InMemoryCheckpointStore::new());
/// let mut events = ProgressFeed::new(store, "run-1").stream();
/// while let Some(event) = events.next().await {
///     println!("{}", event.description());
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct ProgressFeed {
    store: Arc<dyn CheckpointStore>,
    run_id: String,
    interval: Duration,
}

impl ProgressFeed {
    pub fn new(store: Arc<dyn CheckpointStore>, run_id: impl Into<String>) -> Self {
        Self {
            store,
            run_id: run_id.into(),
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling.
    ///
    /// A run with no checkpoints yet is not an error: the feed keeps polling
    /// until one appears. Store errors are logged and the tick skipped.
    pub fn stream(self) -> BoxStream<'static, ProgressEvent> {
        let Self {
            store,
            run_id,
            interval,
        } = self;

        let events = async_stream::stream! {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_emitted: Option<CheckpointId> = None;

            loop {
                ticker.tick().await;

                let latest = match store.latest(&run_id).await {
                    Ok(latest) => latest,
                    Err(e) => {
                        warn!(run_id = %run_id, error = %e, "Progress poll failed");
                        continue;
                    }
                };

                if let Some(checkpoint) = latest {
                    if last_emitted != Some(checkpoint.id) {
                        debug!(run_id = %run_id, checkpoint_id = %checkpoint.id, stage = %checkpoint.stage_name, "Progress event");
                        last_emitted = Some(checkpoint.id);
                        yield ProgressEvent::from_checkpoint(&checkpoint);
                    }
                }
            }
        };

        Box::pin(events)
    }
}

impl std::fmt::Debug for ProgressFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressFeed")
            .field("run_id", &self.run_id)
            .field("interval", &self.interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_checkpoint::InMemoryCheckpointStore;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_emits_once_per_checkpoint() {
        let store = InMemoryCheckpointStore::new();
        store
            .append("run-1", "starter", json!({"status": "running"}), "run started")
            .await
            .unwrap();

        let mut events = ProgressFeed::new(Arc::new(store.clone()), "run-1")
            .with_interval(Duration::from_millis(100))
            .stream();

        let first = events.next().await.unwrap();
        assert_eq!(first.stage_name, "starter");

        // Several idle polls must not repeat the event
        let idle = tokio::time::timeout(Duration::from_millis(350), events.next()).await;
        assert!(idle.is_err());

        store
            .append("run-1", "Draftsman", json!({"status": "running"}), "Draft created v1")
            .await
            .unwrap();
        let second = events.next().await.unwrap();
        assert_eq!(second.stage_name, "Draftsman");
        assert_eq!(second.note, "Draft created v1");
    }
}
