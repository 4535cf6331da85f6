//! Shared access to a record across the engine and observer contexts.
//!
//! The engine loop is the only writer. Observers take the lock briefly to drain
//! the dirty-mask together with a copy of the values it describes.

use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::fields::TorrentMask;

use super::{Snapshot, TorrentRecord};

/// Fields changed since the previous observation plus a consistent copy of the record.
#[derive(Debug, Clone)]
pub struct Observation {
    /// Fields changed since the last drain.
    pub changed: TorrentMask,
    /// Record state at the moment of the drain.
    pub record: TorrentRecord,
}

/// Cloneable, thread-safe handle to a [`TorrentRecord`].
#[derive(Debug, Clone)]
pub struct RecordHandle {
    id: Uuid,
    inner: Arc<Mutex<TorrentRecord>>,
}

impl RecordHandle {
    /// Wrap `record` for shared use.
    #[must_use]
    pub fn new(record: TorrentRecord) -> Self {
        Self {
            id: record.id(),
            inner: Arc::new(Mutex::new(record)),
        }
    }

    /// Torrent identity.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    fn lock(&self) -> SyncResult<MutexGuard<'_, TorrentRecord>> {
        self.inner.lock().map_err(|_| SyncError::LockPoisoned {
            torrent_id: self.id,
        })
    }

    /// Apply an engine snapshot under the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the record was removed or the lock is poisoned.
    pub fn apply(&self, snapshot: &Snapshot) -> SyncResult<TorrentMask> {
        self.lock()?.apply(snapshot)
    }

    /// Read and clear the pending dirty-mask.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn consume_dirty(&self) -> SyncResult<TorrentMask> {
        Ok(self.lock()?.consume_dirty())
    }

    /// Drain the dirty-mask and copy the record in one critical section.
    ///
    /// Returns `None` when nothing changed since the previous drain.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn observe(&self) -> SyncResult<Option<Observation>> {
        let mut record = self.lock()?;
        let changed = record.consume_dirty();
        if changed.is_empty() {
            return Ok(None);
        }
        Ok(Some(Observation {
            changed,
            record: record.clone(),
        }))
    }

    /// Run `read` against the record while holding the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn with<R>(&self, read: impl FnOnce(&mut TorrentRecord) -> R) -> SyncResult<R> {
        let mut record = self.lock()?;
        Ok(read(&mut record))
    }

    /// Copy of the current record.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn cloned(&self) -> SyncResult<TorrentRecord> {
        Ok(self.lock()?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::TorrentField;
    use anyhow::Result;
    use std::thread;

    #[test]
    fn observe_drains_once() -> Result<()> {
        let handle = RecordHandle::new(TorrentRecord::new(Uuid::new_v4()));
        handle.apply(&Snapshot::new().with(TorrentField::Name, "x")?)?;

        let observation = handle.observe()?.expect("a change was pending");
        assert_eq!(observation.changed, TorrentMask::only(TorrentField::Name));
        assert_eq!(observation.record.name(), Some("x"));
        assert!(handle.observe()?.is_none());
        Ok(())
    }

    #[test]
    fn concurrent_writer_changes_are_never_lost() -> Result<()> {
        let handle = RecordHandle::new(TorrentRecord::new(Uuid::new_v4()));
        let writer = handle.clone();
        let worker = thread::spawn(move || -> SyncResult<()> {
            for value in 1_u64..=200 {
                writer.apply(
                    &Snapshot::new()
                        .with(TorrentField::DownloadedEver, value)?
                        .with(TorrentField::UploadSpeed, value % 7)?,
                )?;
            }
            Ok(())
        });

        let mut seen = TorrentMask::EMPTY;
        while !worker.is_finished() {
            seen |= handle.consume_dirty()?;
        }
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("writer thread panicked"))??;
        seen |= handle.consume_dirty()?;

        assert!(seen.contains(TorrentField::DownloadedEver));
        assert!(seen.contains(TorrentField::UploadSpeed));
        assert_eq!(handle.with(|record| record.unsigned(TorrentField::DownloadedEver))?, 200);
        Ok(())
    }
}
