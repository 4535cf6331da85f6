//! Byte storage for resume snapshots.
//!
//! # Design
//! - One blob per torrent id; replacing a blob is atomic so a crash mid-write
//!   leaves either the previous snapshot or the new one, never a mix.
//! - Every write stages into its own `<id>.<random>.tmp` file, so concurrent
//!   saves of one torrent never share a temp file. The last rename wins.
//! - `read` maps absence to `Ok(None)`; every other failure is an `io::Error`.

use std::collections::HashMap;
use std::fs;
#[cfg(unix)]
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tempfile::Builder;
use uuid::Uuid;

const SNAPSHOT_EXTENSION: &str = "resume";
const TEMP_EXTENSION: &str = "tmp";

/// Keyed byte store with atomic replacement.
pub trait ResumeStorage: Send + Sync {
    /// Stored bytes for `id`, or `None` when nothing was ever written.
    ///
    /// # Errors
    ///
    /// Returns any failure other than absence.
    fn read(&self, id: Uuid) -> io::Result<Option<Vec<u8>>>;

    /// Atomically replace the bytes stored for `id`.
    ///
    /// # Errors
    ///
    /// Returns the underlying failure; the previous bytes stay in place.
    fn replace(&self, id: Uuid, bytes: &[u8]) -> io::Result<()>;

    /// Delete the bytes stored for `id`. Deleting nothing succeeds.
    ///
    /// # Errors
    ///
    /// Returns any failure other than absence.
    fn remove(&self, id: Uuid) -> io::Result<()>;
}

/// Stores one `<id>.resume` file per torrent inside a directory.
#[derive(Debug, Clone)]
pub struct FsResumeStorage {
    root: PathBuf,
}

impl FsResumeStorage {
    /// Storage rooted at `root`. The directory is created lazily on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the snapshots.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory and discard temp files left by an interrupted write.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or scanned.
    pub fn ensure_initialized(&self) -> io::Result<usize> {
        fs::create_dir_all(&self.root)?;
        let mut discarded = 0;
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == TEMP_EXTENSION) {
                fs::remove_file(&path)?;
                discarded += 1;
            }
        }
        if discarded > 0 {
            tracing::debug!(
                root = %self.root.display(),
                discarded,
                "removed interrupted resume writes"
            );
        }
        Ok(discarded)
    }

    /// Path of the snapshot for `id`.
    #[must_use]
    pub fn path_for(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.{SNAPSHOT_EXTENSION}"))
    }

    /// Torrent ids with a stored snapshot, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be scanned. A missing directory
    /// lists as empty.
    pub fn list(&self) -> io::Result<Vec<Uuid>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != SNAPSHOT_EXTENSION) {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| Uuid::parse_str(stem).ok())
            {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// The snapshot is already renamed into place when the directory is synced;
    /// a failed sync only weakens durability across power loss, so it is logged
    /// instead of failing the save. Returns whether the sync succeeded.
    fn settle_root_sync(&self, id: Uuid, synced: io::Result<()>) -> bool {
        match synced {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    root = %self.root.display(),
                    torrent_id = %id,
                    error = %err,
                    "resume directory sync failed after replace"
                );
                false
            }
        }
    }

    #[cfg(unix)]
    fn sync_root(&self) -> io::Result<()> {
        File::open(&self.root)?.sync_all()
    }

    #[cfg(not(unix))]
    #[allow(clippy::unused_self, clippy::unnecessary_wraps)]
    fn sync_root(&self) -> io::Result<()> {
        Ok(())
    }
}

impl ResumeStorage for FsResumeStorage {
    fn read(&self, id: Uuid) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn replace(&self, id: Uuid, bytes: &[u8]) -> io::Result<()> {
        fs::create_dir_all(&self.root)?;
        let mut staged = Builder::new()
            .prefix(&format!("{id}."))
            .suffix(&format!(".{TEMP_EXTENSION}"))
            .tempfile_in(&self.root)?;
        staged.write_all(bytes)?;
        staged.as_file().sync_all()?;
        staged
            .persist(self.path_for(id))
            .map_err(|err| err.error)?;

        self.settle_root_sync(id, self.sync_root());
        Ok(())
    }

    fn remove(&self, id: Uuid) -> io::Result<()> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Process-local storage, mainly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryResumeStorage {
    blobs: Mutex<HashMap<Uuid, Vec<u8>>>,
}

impl MemoryResumeStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> io::Result<MutexGuard<'_, HashMap<Uuid, Vec<u8>>>> {
        self.blobs
            .lock()
            .map_err(|_| io::Error::other("resume storage lock poisoned"))
    }

    /// Store raw bytes for `id`, bypassing any codec.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn insert_raw(&self, id: Uuid, bytes: impl Into<Vec<u8>>) -> io::Result<()> {
        self.blobs()?.insert(id, bytes.into());
        Ok(())
    }

    /// Number of stored blobs.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn blob_count(&self) -> io::Result<usize> {
        Ok(self.blobs()?.len())
    }
}

impl ResumeStorage for MemoryResumeStorage {
    fn read(&self, id: Uuid) -> io::Result<Option<Vec<u8>>> {
        Ok(self.blobs()?.get(&id).cloned())
    }

    fn replace(&self, id: Uuid, bytes: &[u8]) -> io::Result<()> {
        self.blobs()?.insert(id, bytes.to_vec());
        Ok(())
    }

    fn remove(&self, id: Uuid) -> io::Result<()> {
        self.blobs()?.remove(&id);
        Ok(())
    }
}

impl<T: ResumeStorage + ?Sized> ResumeStorage for std::sync::Arc<T> {
    fn read(&self, id: Uuid) -> io::Result<Option<Vec<u8>>> {
        (**self).read(id)
    }

    fn replace(&self, id: Uuid, bytes: &[u8]) -> io::Result<()> {
        (**self).replace(id, bytes)
    }

    fn remove(&self, id: Uuid) -> io::Result<()> {
        (**self).remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn fs_storage_replaces_atomically_and_reads_back() -> Result<()> {
        let dir = TempDir::new()?;
        let storage = FsResumeStorage::new(dir.path().join("resume"));
        let id = Uuid::new_v4();

        assert_eq!(storage.read(id)?, None);
        storage.replace(id, b"first")?;
        storage.replace(id, b"second")?;
        assert_eq!(storage.read(id)?.as_deref(), Some(&b"second"[..]));
        assert_eq!(fs::read_dir(storage.root())?.count(), 1);
        assert_eq!(storage.list()?, vec![id]);

        storage.remove(id)?;
        storage.remove(id)?;
        assert_eq!(storage.read(id)?, None);
        Ok(())
    }

    #[test]
    fn ensure_initialized_discards_interrupted_writes() -> Result<()> {
        let dir = TempDir::new()?;
        let storage = FsResumeStorage::new(dir.path());
        let id = Uuid::new_v4();
        storage.replace(id, b"kept")?;
        fs::write(dir.path().join(format!("{}.tmp", Uuid::new_v4())), b"half")?;
        fs::write(dir.path().join(format!("{id}.a1b2c3.tmp")), b"half")?;
        fs::write(dir.path().join("notes.txt"), b"ignored")?;

        assert_eq!(storage.ensure_initialized()?, 2);
        assert_eq!(storage.list()?, vec![id]);
        Ok(())
    }

    #[test]
    fn directory_sync_failure_does_not_undo_a_replace() -> Result<()> {
        let dir = TempDir::new()?;
        let storage = FsResumeStorage::new(dir.path());
        let id = Uuid::new_v4();
        storage.replace(id, b"durable")?;

        assert!(storage.settle_root_sync(id, Ok(())));
        assert!(!storage.settle_root_sync(id, Err(io::Error::other("fsync refused"))));
        assert_eq!(storage.read(id)?.as_deref(), Some(&b"durable"[..]));
        Ok(())
    }

    #[test]
    fn list_of_missing_directory_is_empty() -> Result<()> {
        let dir = TempDir::new()?;
        let storage = FsResumeStorage::new(dir.path().join("absent"));
        assert!(storage.list()?.is_empty());
        Ok(())
    }

    #[test]
    fn memory_storage_behaves_like_a_map() -> Result<()> {
        let storage = MemoryResumeStorage::new();
        let id = Uuid::new_v4();
        storage.insert_raw(id, "raw")?;
        assert_eq!(storage.read(id)?.as_deref(), Some(&b"raw"[..]));
        storage.remove(id)?;
        assert_eq!(storage.blob_count()?, 0);
        Ok(())
    }
}
