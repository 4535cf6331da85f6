//! Torrent admission, live updates, and removal.
//!
//! # Design
//! - `add` resolves resume data on the blocking pool; a torrent removed while
//!   its load is in flight is never admitted.
//! - Degraded resume data never blocks an add unless strict IO is configured.
//! - The session owns the checkpointer and, when a poll interval is set, the
//!   change feed; `shutdown` drains both with a final pass.

use std::sync::Arc;
use std::time::Duration;

use stasis_config::StasisConfig;
use stasis_core::{RecordHandle, ResumeMask, Snapshot, TorrentMask, TorrentRecord};
use stasis_events::{Event, EventBus};
use stasis_resume::{
    AddTorrentOptions, FsResumeStorage, JsonResumeCodec, LoadOutcome, ResumeCodec, ResumeStorage,
    ResumeStore,
};
use stasis_telemetry::{Metrics, torrent_span};
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

use crate::checkpoint::{CheckpointReport, Checkpointer};
use crate::describe;
use crate::error::{RuntimeError, RuntimeResult};
use crate::feed::ChangeFeed;
use crate::tracked::{Taken, TrackedTorrents};

/// Session behaviour knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Debounce window between checkpoint passes.
    pub checkpoint_interval: Duration,
    /// Fail an add when existing resume data cannot be read.
    pub strict_resume_io: bool,
    /// Poll interval of the session-owned [`ChangeFeed`]. `None` leaves dirty
    /// masks to the caller.
    pub change_poll_interval: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&StasisConfig::default())
    }
}

impl From<&StasisConfig> for SessionOptions {
    fn from(config: &StasisConfig) -> Self {
        Self {
            checkpoint_interval: config.checkpoint_interval(),
            strict_resume_io: config.strict_resume_io,
            change_poll_interval: Some(config.change_poll_interval()),
        }
    }
}

/// A torrent to admit.
#[derive(Debug, Clone)]
pub struct AddRequest {
    /// Torrent identifier.
    pub id: Uuid,
    /// Persisted fields to resolve from overrides or disk.
    pub fields: ResumeMask,
    /// Caller-supplied values that win over stored ones.
    pub options: AddTorrentOptions,
    /// Engine defaults for whatever is still unresolved after loading.
    pub defaults: Snapshot,
}

impl AddRequest {
    /// Request resolving every persisted field, with no overrides or defaults.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            fields: ResumeMask::all(),
            options: AddTorrentOptions::default(),
            defaults: Snapshot::new(),
        }
    }

    /// Restrict loading to `fields`.
    #[must_use]
    pub const fn with_fields(mut self, fields: ResumeMask) -> Self {
        self.fields = fields;
        self
    }

    /// Use `options` as overrides.
    #[must_use]
    pub fn with_options(mut self, options: AddTorrentOptions) -> Self {
        self.options = options;
        self
    }

    /// Use `defaults` for unresolved fields.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Snapshot) -> Self {
        self.defaults = defaults;
        self
    }
}

/// Result of a successful add.
#[derive(Debug, Clone)]
pub struct AddedTorrent {
    /// Shared handle to the live record.
    pub handle: RecordHandle,
    /// Persisted fields resolved from overrides or disk.
    pub loaded: ResumeMask,
    /// `restored` or why resume data was unavailable.
    pub resume: &'static str,
    /// Stored keys that could not be applied.
    pub skipped: Vec<String>,
}

/// How to dispose of a torrent's persisted state on removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Write the record one last time before forgetting it.
    pub final_save: bool,
    /// Delete the stored snapshot.
    pub delete_resume: bool,
}

impl Default for RemoveOptions {
    fn default() -> Self {
        Self {
            final_save: true,
            delete_resume: false,
        }
    }
}

/// Result of a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovedTorrent {
    /// Torrent identifier.
    pub torrent_id: Uuid,
    /// Whether a final snapshot was written.
    pub saved: bool,
    /// Whether the stored snapshot was deleted.
    pub resume_deleted: bool,
}

/// Tracks torrents and keeps their resume snapshots current.
pub struct TorrentSession<S = FsResumeStorage, C = JsonResumeCodec> {
    store: Arc<ResumeStore<S, C>>,
    tracked: TrackedTorrents,
    checkpointer: Checkpointer,
    feed: Option<ChangeFeed>,
    events: EventBus,
    metrics: Metrics,
    options: SessionOptions,
}

impl TorrentSession {
    /// Session storing JSON snapshots in the configured resume directory.
    ///
    /// Temp files left by an interrupted save are discarded first.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Storage`] if the directory cannot be prepared.
    pub fn from_config(
        config: &StasisConfig,
        events: EventBus,
        metrics: Metrics,
    ) -> RuntimeResult<Self> {
        let store = ResumeStore::open(&config.resume_dir);
        store
            .storage()
            .ensure_initialized()
            .map_err(|source| RuntimeError::Storage {
                path: config.resume_dir.clone(),
                source,
            })?;
        Ok(Self::new(store, events, metrics, SessionOptions::from(config)))
    }
}

impl<S, C> TorrentSession<S, C>
where
    S: ResumeStorage + 'static,
    C: ResumeCodec + 'static,
{
    /// Session over `store`; spawns the checkpointer, and the change feed when
    /// [`SessionOptions::change_poll_interval`] is set, on the current runtime.
    #[must_use]
    pub fn new(
        store: ResumeStore<S, C>,
        events: EventBus,
        metrics: Metrics,
        options: SessionOptions,
    ) -> Self {
        let store = Arc::new(store);
        let checkpointer = Checkpointer::spawn(
            Arc::clone(&store),
            events.clone(),
            metrics.clone(),
            options.checkpoint_interval,
        );
        let tracked = TrackedTorrents::new();
        let feed = options
            .change_poll_interval
            .map(|interval| ChangeFeed::spawn(tracked.clone(), events.clone(), interval));
        Self {
            store,
            tracked,
            checkpointer,
            feed,
            events,
            metrics,
            options,
        }
    }

    /// Registry shared with observers such as [`crate::ChangeFeed`].
    #[must_use]
    pub fn tracked(&self) -> TrackedTorrents {
        self.tracked.clone()
    }

    /// Bus the session publishes on.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Handle of a live torrent.
    pub async fn handle(&self, id: Uuid) -> Option<RecordHandle> {
        self.tracked.get(id).await
    }

    /// Ids of live torrents, sorted.
    pub async fn ids(&self) -> Vec<Uuid> {
        self.tracked.ids().await
    }

    /// Resolve resume data for a torrent and start tracking it.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::AlreadyTracked`] for a duplicate id,
    /// [`RuntimeError::AddCancelled`] if the torrent was removed while loading,
    /// and resume or sync errors from loading and applying defaults.
    pub async fn add(&self, request: AddRequest) -> RuntimeResult<AddedTorrent> {
        let id = request.id;
        self.add_inner(request)
            .instrument(torrent_span("add", id))
            .await
    }

    async fn add_inner(&self, request: AddRequest) -> RuntimeResult<AddedTorrent> {
        let id = request.id;
        self.tracked.begin_load(id).await?;
        let prepared = self.prepare(request).await;
        let admitted = self
            .tracked
            .finish_load(id, prepared.as_ref().ok().map(|added| added.handle.clone()))
            .await;
        if !admitted {
            debug!("torrent removed before its resume data finished loading");
            return Err(RuntimeError::AddCancelled { torrent_id: id });
        }
        let added = prepared?;

        self.metrics.set_tracked_torrents(self.tracked.len().await);
        self.checkpointer.mark(added.handle.clone()).await?;
        let name = added
            .handle
            .with(|record| record.name().map(str::to_owned))
            .map_err(RuntimeError::sync("add"))?;
        let loaded = added.loaded.keys().into_iter().map(str::to_owned).collect();
        let _ = self.events.publish(Event::TorrentAdded {
            torrent_id: id,
            name,
            loaded,
            resume: added.resume.to_string(),
        });
        info!(
            resume = added.resume,
            loaded = added.loaded.len(),
            skipped = added.skipped.len(),
            "torrent added"
        );
        Ok(added)
    }

    async fn prepare(&self, request: AddRequest) -> RuntimeResult<AddedTorrent> {
        let AddRequest {
            id,
            fields,
            options,
            defaults,
        } = request;
        let store = Arc::clone(&self.store);
        let outcome = tokio::task::spawn_blocking(move || store.load(id, fields, &options))
            .await
            .map_err(|source| RuntimeError::Join {
                operation: "load",
                source,
            })?
            .map_err(RuntimeError::resume("load"))?;
        self.metrics.inc_resume_load(outcome.label());

        let outcome = if self.options.strict_resume_io {
            outcome
                .into_strict()
                .map_err(RuntimeError::resume("load"))?
        } else {
            outcome
        };
        let resume = outcome.label();
        let LoadOutcome {
            mut record,
            loaded,
            skipped,
            ..
        } = outcome;
        record
            .go_live(&defaults)
            .map_err(RuntimeError::sync("go_live"))?;
        Ok(AddedTorrent {
            handle: RecordHandle::new(record),
            loaded,
            resume,
            skipped,
        })
    }

    /// Apply an engine snapshot to a live torrent.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnknownTorrent`] if `id` is not live, or a sync
    /// error if a value has the wrong kind.
    pub async fn apply(&self, id: Uuid, snapshot: &Snapshot) -> RuntimeResult<TorrentMask> {
        let handle = self
            .tracked
            .get(id)
            .await
            .ok_or(RuntimeError::UnknownTorrent { torrent_id: id })?;
        let changed = handle
            .apply(snapshot)
            .map_err(RuntimeError::sync("apply"))?;
        self.metrics.observe_apply(changed.len());
        Ok(changed)
    }

    /// Stop tracking a torrent.
    ///
    /// A removal racing an in-flight add cancels that add.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnknownTorrent`] if nothing is tracked under `id`,
    /// or [`RuntimeError::Resume`] if the snapshot could not be deleted.
    pub async fn remove(&self, id: Uuid, options: RemoveOptions) -> RuntimeResult<RemovedTorrent> {
        self.remove_inner(id, options)
            .instrument(torrent_span("remove", id))
            .await
    }

    async fn remove_inner(&self, id: Uuid, options: RemoveOptions) -> RuntimeResult<RemovedTorrent> {
        let mut saved = false;
        if let Taken::Live(handle) = self.tracked.take(id).await? {
            self.checkpointer.forget(id).await?;
            if options.final_save && !options.delete_resume {
                let record = handle.cloned().map_err(RuntimeError::sync("remove"))?;
                saved = self.save_now(record).await;
            }
            handle
                .with(TorrentRecord::mark_removed)
                .map_err(RuntimeError::sync("remove"))?;
            self.metrics.set_tracked_torrents(self.tracked.len().await);
        }

        if options.delete_resume {
            self.delete_snapshot(id).await?;
        }
        let _ = self.events.publish(Event::TorrentRemoved {
            torrent_id: id,
            resume_deleted: options.delete_resume,
        });
        info!(saved, resume_deleted = options.delete_resume, "torrent removed");
        Ok(RemovedTorrent {
            torrent_id: id,
            saved,
            resume_deleted: options.delete_resume,
        })
    }

    async fn save_now(&self, record: TorrentRecord) -> bool {
        let id = record.id();
        let generation = record.persist_generation();
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || store.save(&record))
            .await
            .map_err(|source| RuntimeError::Join {
                operation: "save",
                source,
            })
            .and_then(|saved| saved.map_err(RuntimeError::resume("save")));
        self.metrics.inc_resume_save(result.is_ok());
        match result {
            Ok(()) => {
                let _ = self.events.publish(Event::ResumeSaved {
                    torrent_id: id,
                    generation,
                });
                true
            }
            Err(err) => {
                warn!(error = %err, "final resume save failed");
                let _ = self.events.publish(Event::ResumeFailed {
                    torrent_id: id,
                    operation: "save".to_string(),
                    message: describe(&err),
                });
                false
            }
        }
    }

    async fn delete_snapshot(&self, id: Uuid) -> RuntimeResult<()> {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || store.remove(id))
            .await
            .map_err(|source| RuntimeError::Join {
                operation: "remove",
                source,
            })
            .and_then(|removed| removed.map_err(RuntimeError::resume("remove")));
        if let Err(err) = &result {
            warn!(error = %err, "resume snapshot deletion failed");
            let _ = self.events.publish(Event::ResumeFailed {
                torrent_id: id,
                operation: "remove".to_string(),
                message: describe(err),
            });
        }
        result
    }

    /// Save every torrent with unsaved changes now.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::WorkerStopped`] if the checkpointer has exited.
    pub async fn flush(&self) -> RuntimeResult<CheckpointReport> {
        self.checkpointer.flush().await
    }

    /// Stop the change feed and the checkpointer, each after a final pass.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Join`] if either worker panicked.
    pub async fn shutdown(self) -> RuntimeResult<CheckpointReport> {
        if let Some(feed) = self.feed {
            feed.shutdown().await?;
        }
        self.checkpointer.shutdown().await
    }
}
