//! Registry of tracked torrents and in-flight adds.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use stasis_core::RecordHandle;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{RuntimeError, RuntimeResult};

/// Shared view of the torrents a session tracks.
#[derive(Debug, Clone, Default)]
pub struct TrackedTorrents {
    inner: Arc<RwLock<Registry>>,
}

#[derive(Debug, Default)]
struct Registry {
    live: HashMap<Uuid, RecordHandle>,
    loading: HashSet<Uuid>,
    cancelled: HashSet<Uuid>,
}

/// What [`TrackedTorrents::take`] found for an id.
#[derive(Debug)]
pub(crate) enum Taken {
    Live(RecordHandle),
    Loading,
}

impl TrackedTorrents {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `id`, if it is live.
    pub async fn get(&self, id: Uuid) -> Option<RecordHandle> {
        self.inner.read().await.live.get(&id).cloned()
    }

    /// Handles of every live torrent, ordered by id.
    pub async fn handles(&self) -> Vec<RecordHandle> {
        let mut handles: Vec<_> = self.inner.read().await.live.values().cloned().collect();
        handles.sort_by_key(RecordHandle::id);
        handles
    }

    /// Ids of every live torrent, sorted.
    pub async fn ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<_> = self.inner.read().await.live.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of live torrents.
    pub async fn len(&self) -> usize {
        self.inner.read().await.live.len()
    }

    /// Whether no torrent is live.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.live.is_empty()
    }

    pub(crate) async fn begin_load(&self, id: Uuid) -> RuntimeResult<()> {
        let mut registry = self.inner.write().await;
        if registry.live.contains_key(&id) || !registry.loading.insert(id) {
            return Err(RuntimeError::AlreadyTracked { torrent_id: id });
        }
        registry.cancelled.remove(&id);
        Ok(())
    }

    /// Finish a load; returns `false` when the torrent was removed meanwhile.
    pub(crate) async fn finish_load(&self, id: Uuid, handle: Option<RecordHandle>) -> bool {
        let mut registry = self.inner.write().await;
        registry.loading.remove(&id);
        if registry.cancelled.remove(&id) {
            return false;
        }
        if let Some(handle) = handle {
            registry.live.insert(id, handle);
        }
        true
    }

    pub(crate) async fn take(&self, id: Uuid) -> RuntimeResult<Taken> {
        let mut registry = self.inner.write().await;
        if let Some(handle) = registry.live.remove(&id) {
            return Ok(Taken::Live(handle));
        }
        if registry.loading.contains(&id) {
            registry.cancelled.insert(id);
            return Ok(Taken::Loading);
        }
        Err(RuntimeError::UnknownTorrent { torrent_id: id })
    }
}
