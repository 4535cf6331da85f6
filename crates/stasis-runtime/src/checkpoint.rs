//! Debounced background saving of resume snapshots.
//!
//! # Design
//! - One tokio task owns the set of tracked handles; callers talk to it through
//!   commands so saves never race with `forget`.
//! - A record is saved when its persist generation moved past the last saved one.
//! - Saves run on the blocking pool and finish even if the caller stops waiting.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use stasis_core::{RecordHandle, TorrentRecord};
use stasis_events::{Event, EventBus};
use stasis_resume::{ResumeCodec, ResumeResult, ResumeStorage, ResumeStore};
use stasis_telemetry::Metrics;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::describe;
use crate::error::{RuntimeError, RuntimeResult};

const COMMAND_BUFFER: usize = 64;
const RESUME_COMPONENT: &str = "resume_store";

/// Counts from one checkpoint pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointReport {
    /// Snapshots written.
    pub saved: usize,
    /// Snapshots that failed to write.
    pub failed: usize,
}

impl CheckpointReport {
    /// Whether the pass had nothing to do.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.saved == 0 && self.failed == 0
    }

    const fn merge(self, other: Self) -> Self {
        Self {
            saved: self.saved + other.saved,
            failed: self.failed + other.failed,
        }
    }
}

enum CheckpointCommand {
    Mark(RecordHandle),
    Flush(oneshot::Sender<CheckpointReport>),
    Forget {
        id: Uuid,
        done: oneshot::Sender<()>,
    },
}

/// Handle to the checkpoint worker.
pub struct Checkpointer {
    commands: mpsc::Sender<CheckpointCommand>,
    task: JoinHandle<CheckpointReport>,
}

impl Checkpointer {
    /// Spawn the worker on the current tokio runtime.
    #[must_use]
    pub fn spawn<S, C>(
        store: Arc<ResumeStore<S, C>>,
        events: EventBus,
        metrics: Metrics,
        interval: Duration,
    ) -> Self
    where
        S: ResumeStorage + 'static,
        C: ResumeCodec + 'static,
    {
        let (commands, mut receiver) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(async move {
            let mut worker = Worker {
                store,
                events,
                metrics,
                tracked: HashMap::new(),
                health: BTreeSet::new(),
            };
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    command = receiver.recv() => {
                        match command {
                            Some(command) => worker.handle(command).await,
                            None => break,
                        }
                    }
                    _ = ticker.tick() => {
                        let report = worker.checkpoint().await;
                        if !report.is_empty() {
                            debug!(saved = report.saved, failed = report.failed, "checkpoint pass");
                        }
                    }
                }
            }
            let report = worker.checkpoint().await;
            debug!(saved = report.saved, failed = report.failed, "final checkpoint pass");
            report
        });
        Self { commands, task }
    }

    async fn send(&self, command: CheckpointCommand) -> RuntimeResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RuntimeError::WorkerStopped {
                worker: "checkpointer",
            })
    }

    /// Start checkpointing `handle`. Marking a tracked record again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::WorkerStopped`] if the worker has exited.
    pub async fn mark(&self, handle: RecordHandle) -> RuntimeResult<()> {
        self.send(CheckpointCommand::Mark(handle)).await
    }

    /// Save every record with unsaved changes now.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::WorkerStopped`] if the worker has exited.
    pub async fn flush(&self) -> RuntimeResult<CheckpointReport> {
        let (reply, report) = oneshot::channel();
        self.send(CheckpointCommand::Flush(reply)).await?;
        report.await.map_err(|_| RuntimeError::WorkerStopped {
            worker: "checkpointer",
        })
    }

    /// Stop checkpointing `id`. Once this returns no further save for it starts.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::WorkerStopped`] if the worker has exited.
    pub async fn forget(&self, id: Uuid) -> RuntimeResult<()> {
        let (done, ack) = oneshot::channel();
        self.send(CheckpointCommand::Forget { id, done }).await?;
        ack.await.map_err(|_| RuntimeError::WorkerStopped {
            worker: "checkpointer",
        })
    }

    /// Stop the worker after a final pass and return that pass's counts.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Join`] if the worker panicked.
    pub async fn shutdown(self) -> RuntimeResult<CheckpointReport> {
        drop(self.commands);
        self.task.await.map_err(|source| RuntimeError::Join {
            operation: "checkpoint_shutdown",
            source,
        })
    }
}

struct Tracked {
    handle: RecordHandle,
    saved_generation: u64,
}

struct Worker<S, C> {
    store: Arc<ResumeStore<S, C>>,
    events: EventBus,
    metrics: Metrics,
    tracked: HashMap<Uuid, Tracked>,
    health: BTreeSet<String>,
}

impl<S, C> Worker<S, C>
where
    S: ResumeStorage + 'static,
    C: ResumeCodec + 'static,
{
    async fn handle(&mut self, command: CheckpointCommand) {
        match command {
            CheckpointCommand::Mark(handle) => {
                self.tracked.entry(handle.id()).or_insert(Tracked {
                    handle,
                    saved_generation: 0,
                });
            }
            CheckpointCommand::Flush(reply) => {
                let report = self.checkpoint().await;
                let _ = reply.send(report);
            }
            CheckpointCommand::Forget { id, done } => {
                self.tracked.remove(&id);
                let _ = done.send(());
            }
        }
    }

    fn unsaved(&self) -> Vec<TorrentRecord> {
        let mut batch = Vec::new();
        for (id, tracked) in &self.tracked {
            let saved = tracked.saved_generation;
            match tracked
                .handle
                .with(|record| (record.persist_generation() > saved).then(|| record.clone()))
            {
                Ok(Some(record)) => batch.push(record),
                Ok(None) => {}
                Err(err) => warn!(torrent_id = %id, error = %err, "checkpoint skipped record"),
            }
        }
        batch
    }

    async fn checkpoint(&mut self) -> CheckpointReport {
        let batch = self.unsaved();
        if batch.is_empty() {
            return CheckpointReport::default();
        }
        let attempted = batch.len();
        let store = Arc::clone(&self.store);
        let results = tokio::task::spawn_blocking(move || {
            batch
                .into_iter()
                .map(|record| {
                    let result: ResumeResult<()> = store.save(&record);
                    (record.id(), record.persist_generation(), result)
                })
                .collect::<Vec<_>>()
        })
        .await;

        let results = match results {
            Ok(results) => results,
            Err(err) => {
                let detail = err.to_string();
                self.metrics.inc_resume_save(false);
                self.mark_degraded(&detail);
                return CheckpointReport {
                    saved: 0,
                    failed: attempted,
                };
            }
        };

        let mut report = CheckpointReport::default();
        let mut failure = None;
        for (id, generation, result) in results {
            match result {
                Ok(()) => {
                    if let Some(tracked) = self.tracked.get_mut(&id) {
                        tracked.saved_generation = generation;
                    }
                    self.metrics.inc_resume_save(true);
                    let _ = self.events.publish(Event::ResumeSaved {
                        torrent_id: id,
                        generation,
                    });
                    report = report.merge(CheckpointReport {
                        saved: 1,
                        failed: 0,
                    });
                }
                Err(err) => {
                    let message = describe(&err);
                    self.metrics.inc_resume_save(false);
                    let _ = self.events.publish(Event::ResumeFailed {
                        torrent_id: id,
                        operation: "save".to_string(),
                        message: message.clone(),
                    });
                    failure = Some(message);
                    report = report.merge(CheckpointReport {
                        saved: 0,
                        failed: 1,
                    });
                }
            }
        }

        match failure {
            Some(detail) => self.mark_degraded(&detail),
            None => self.mark_recovered(),
        }
        report
    }

    fn mark_degraded(&mut self, detail: &str) {
        if self.health.insert(RESUME_COMPONENT.to_string()) {
            let degraded = self.health.iter().cloned().collect();
            let _ = self.events.publish(Event::HealthChanged { degraded });
            warn!(component = RESUME_COMPONENT, detail = %detail, "component degraded");
        } else {
            warn!(component = RESUME_COMPONENT, detail = %detail, "component still degraded");
        }
    }

    fn mark_recovered(&mut self) {
        if self.health.remove(RESUME_COMPONENT) {
            let degraded = self.health.iter().cloned().collect();
            let _ = self.events.publish(Event::HealthChanged { degraded });
            info!(component = RESUME_COMPONENT, "component recovered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use stasis_core::{Snapshot, TorrentField};
    use stasis_resume::{JsonResumeCodec, MemoryResumeStorage, ResumeStorage};

    fn memory_store() -> (Arc<MemoryResumeStorage>, Arc<ResumeStore<Arc<MemoryResumeStorage>>>) {
        let storage = Arc::new(MemoryResumeStorage::new());
        let store = Arc::new(ResumeStore::new(Arc::clone(&storage), JsonResumeCodec));
        (storage, store)
    }

    #[tokio::test]
    async fn flush_saves_only_advanced_generations() -> Result<()> {
        let (storage, store) = memory_store();
        let metrics = Metrics::new()?;
        let checkpointer = Checkpointer::spawn(
            store,
            EventBus::new(),
            metrics.clone(),
            Duration::from_secs(3_600),
        );
        let id = Uuid::new_v4();
        let handle = RecordHandle::new(TorrentRecord::new(id));
        checkpointer.mark(handle.clone()).await?;

        assert!(checkpointer.flush().await?.is_empty());

        handle.apply(&Snapshot::new().with(TorrentField::Name, "a.iso")?)?;
        assert_eq!(checkpointer.flush().await?.saved, 1);
        assert!(storage.read(id)?.is_some());
        assert!(checkpointer.flush().await?.is_empty());

        handle.apply(&Snapshot::new().with(TorrentField::UploadSpeed, 10_u64)?)?;
        assert!(checkpointer.flush().await?.is_empty());

        assert_eq!(metrics.snapshot().resume_saves_ok, 1);
        checkpointer.shutdown().await?;
        Ok(())
    }

    #[tokio::test]
    async fn forgotten_records_are_not_saved() -> Result<()> {
        let (storage, store) = memory_store();
        let checkpointer = Checkpointer::spawn(
            store,
            EventBus::new(),
            Metrics::new()?,
            Duration::from_secs(3_600),
        );
        let id = Uuid::new_v4();
        let handle = RecordHandle::new(TorrentRecord::new(id));
        checkpointer.mark(handle.clone()).await?;
        checkpointer.forget(id).await?;
        handle.apply(&Snapshot::new().with(TorrentField::Name, "gone")?)?;

        assert!(checkpointer.shutdown().await?.is_empty());
        assert_eq!(storage.blob_count()?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_runs_a_final_pass() -> Result<()> {
        let (storage, store) = memory_store();
        let checkpointer = Checkpointer::spawn(
            store,
            EventBus::new(),
            Metrics::new()?,
            Duration::from_secs(3_600),
        );
        let handle = RecordHandle::new(TorrentRecord::new(Uuid::new_v4()));
        checkpointer.mark(handle.clone()).await?;
        handle.apply(&Snapshot::new().with(TorrentField::Running, true)?)?;

        let report = checkpointer.shutdown().await?;
        assert_eq!(report.saved, 1);
        assert_eq!(storage.blob_count()?, 1);
        Ok(())
    }
}
