//! Recent-capture feed
//!
//! Polls the store on a fixed interval and exposes the newest object
//! for the preview widget. Lives outside the session core; dropping
//! the feed stops the polling task.

use crate::storage::gateway::{StoredObject, UploadGateway};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How often the store is re-checked for a newer object.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct RecentCaptureFeed {
    latest_rx: watch::Receiver<Option<StoredObject>>,
    task: JoinHandle<()>,
}

impl RecentCaptureFeed {
    /// Start polling `bucket` at the default interval.
    pub fn spawn(gateway: Arc<dyn UploadGateway>, bucket: impl Into<String>) -> Self {
        Self::spawn_every(gateway, bucket, POLL_INTERVAL)
    }

    /// Start polling at a custom interval.
    pub fn spawn_every(
        gateway: Arc<dyn UploadGateway>,
        bucket: impl Into<String>,
        interval: Duration,
    ) -> Self {
        let bucket = bucket.into();
        let (latest_tx, latest_rx) = watch::channel(None);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match gateway.list_newest(&bucket).await {
                    Ok(newest) => {
                        if latest_tx.send(newest).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(%bucket, "recent-capture poll failed: {err}");
                    }
                }
            }
        });

        Self { latest_rx, task }
    }

    /// Watch channel carrying the newest object (None until the first
    /// successful poll of a non-empty bucket).
    pub fn subscribe(&self) -> watch::Receiver<Option<StoredObject>> {
        self.latest_rx.clone()
    }

    /// The most recently seen object.
    pub fn latest(&self) -> Option<StoredObject> {
        self.latest_rx.borrow().clone()
    }
}

impl Drop for RecentCaptureFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}
