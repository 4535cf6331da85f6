//! Push layer over the pull-based dirty masks.

use std::time::Duration;

use stasis_events::{Event, EventBus};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use crate::error::{RuntimeError, RuntimeResult};
use crate::tracked::TrackedTorrents;

/// Drain every tracked record once and publish a [`Event::FieldsChanged`] per
/// record that changed. Returns the number of events published.
pub async fn publish_changes(tracked: &TrackedTorrents, events: &EventBus) -> usize {
    let mut published = 0;
    for handle in tracked.handles().await {
        match handle.consume_dirty() {
            Ok(changed) if changed.is_empty() => {}
            Ok(changed) => {
                let fields = changed.keys().into_iter().map(str::to_owned).collect();
                let _ = events.publish(Event::FieldsChanged {
                    torrent_id: handle.id(),
                    fields,
                });
                published += 1;
            }
            Err(err) => warn!(torrent_id = %handle.id(), error = %err, "change feed skipped record"),
        }
    }
    published
}

/// Background task running [`publish_changes`] on an interval.
pub struct ChangeFeed {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ChangeFeed {
    /// Spawn the poller on the current tokio runtime.
    #[must_use]
    pub fn spawn(tracked: TrackedTorrents, events: EventBus, interval: Duration) -> Self {
        let (stop, mut stopped) = oneshot::channel();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        publish_changes(&tracked, &events).await;
                    }
                }
            }
            publish_changes(&tracked, &events).await;
        });
        Self { stop, task }
    }

    /// Publish what is still pending and stop polling.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Join`] if the poller panicked.
    pub async fn shutdown(self) -> RuntimeResult<()> {
        let _ = self.stop.send(());
        self.task.await.map_err(|source| RuntimeError::Join {
            operation: "change_feed_shutdown",
            source,
        })
    }
}
