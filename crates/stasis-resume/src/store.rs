//! Load and save of per-torrent resume snapshots.
//!
//! # Design
//! - `load` never fails because of missing or unreadable resume data. Such
//!   degradations are reported through [`LoadOutcome::issue`]; the caller decides
//!   whether they matter ([`LoadOutcome::into_strict`]).
//! - Overrides are consulted first and win over persisted values field by field.
//! - `save` writes the full persisted view of a record through an atomic replace.
//! - A current-format snapshot holding unknown keys or values of the wrong kind
//!   counts as corrupt. Only newer formats may carry entries this build skips.

use std::path::PathBuf;

use stasis_core::{
    FieldValue, ResumeField, ResumeMask, Snapshot, SyncError, TorrentRecord,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::codec::{FORMAT_VERSION, JsonResumeCodec, ResumeCodec, ResumeSnapshot};
use crate::error::{CodecError, ResumeError, ResumeIssue, ResumeResult};
use crate::overrides::OverrideSource;
use crate::storage::{FsResumeStorage, ResumeStorage};

/// Result of [`ResumeStore::load`].
#[derive(Debug)]
pub struct LoadOutcome {
    /// Record populated with every resolved field, in the partially loaded phase.
    pub record: TorrentRecord,
    /// Requested fields that were resolved, from either source.
    pub loaded: ResumeMask,
    /// Requested fields resolved from overrides.
    pub overridden: ResumeMask,
    /// Why persisted data was unavailable or only partly usable.
    pub issue: Option<ResumeIssue>,
    /// Stored keys that could not be applied.
    pub skipped: Vec<String>,
}

impl LoadOutcome {
    /// Requested fields the caller still has to default.
    #[must_use]
    pub fn unresolved(&self, requested: ResumeMask) -> ResumeMask {
        requested - self.loaded
    }

    /// Label for logs and metrics: `restored` or the issue's label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.issue.as_ref().map_or("restored", ResumeIssue::as_str)
    }

    /// Escalate a storage failure into an error; other issues pass through.
    ///
    /// # Errors
    ///
    /// Returns [`ResumeError::Io`] when the snapshot could not be read for a
    /// reason other than absence or corruption.
    pub fn into_strict(mut self) -> ResumeResult<Self> {
        match self.issue.take() {
            Some(ResumeIssue::Io { source }) => Err(ResumeError::Io {
                operation: "load",
                torrent_id: self.record.id(),
                source,
            }),
            issue => {
                self.issue = issue;
                Ok(self)
            }
        }
    }
}

/// Persists resume snapshots through a storage and a codec.
#[derive(Debug, Clone)]
pub struct ResumeStore<S = FsResumeStorage, C = JsonResumeCodec> {
    storage: S,
    codec: C,
}

impl ResumeStore {
    /// JSON snapshots in `dir`.
    #[must_use]
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::new(FsResumeStorage::new(dir), JsonResumeCodec)
    }
}

impl<S: ResumeStorage, C: ResumeCodec> ResumeStore<S, C> {
    /// Store backed by `storage` and `codec`.
    pub const fn new(storage: S, codec: C) -> Self {
        Self { storage, codec }
    }

    /// Underlying storage.
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Read and decode the stored snapshot for `id`.
    ///
    /// # Errors
    ///
    /// Returns the reason no usable snapshot is available. A current-format
    /// snapshot with entries outside the persisted catalog is
    /// [`ResumeIssue::Corrupt`].
    pub fn read_snapshot(&self, id: Uuid) -> Result<ResumeSnapshot, ResumeIssue> {
        let bytes = match self.storage.read(id) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Err(ResumeIssue::NotFound),
            Err(source) => return Err(ResumeIssue::Io { source }),
        };
        let snapshot = match self.codec.decode(&bytes) {
            Ok(snapshot) => snapshot,
            Err(CodecError::Absent) => return Err(ResumeIssue::NotFound),
            Err(source) => return Err(ResumeIssue::Corrupt { source }),
        };
        if !snapshot.is_newer_format() {
            let stray = snapshot.unrecognized();
            if !stray.is_empty() {
                return Err(ResumeIssue::Corrupt {
                    source: CodecError::corrupt(format!(
                        "format version {} does not define entries: {}",
                        snapshot.version(),
                        stray.join(", ")
                    )),
                });
            }
        }
        Ok(snapshot)
    }

    /// Build a record for `id` from overrides and the stored snapshot.
    ///
    /// Only fields in `fields_to_load` are considered. Overrides are applied first;
    /// the stored snapshot fills the remaining requested fields it holds. Missing,
    /// corrupt, or unreadable snapshot data degrades to "no data" and is reported
    /// in [`LoadOutcome::issue`].
    ///
    /// # Errors
    ///
    /// Returns [`ResumeError::Value`] if an override does not match its field's kind.
    pub fn load<O>(
        &self,
        id: Uuid,
        fields_to_load: ResumeMask,
        overrides: &O,
    ) -> ResumeResult<LoadOutcome>
    where
        O: OverrideSource + ?Sized,
    {
        let value_error = |source: SyncError| ResumeError::Value {
            torrent_id: id,
            source,
        };

        let mut resolved = Snapshot::new();
        let mut overridden = ResumeMask::EMPTY;
        for field in fields_to_load.iter() {
            if let Some(value) = overrides.override_for(field) {
                resolved.insert(field.synced(), value).map_err(value_error)?;
                overridden.insert(field);
            }
        }
        let mut loaded = overridden;

        let (stored, mut issue) = match self.read_snapshot(id) {
            Ok(snapshot) => (Some(snapshot), None),
            Err(issue) => (None, Some(issue)),
        };

        let mut skipped = Vec::new();
        if let Some(snapshot) = &stored {
            for field in (fields_to_load - overridden).iter() {
                if let Some(value) = snapshot.get(field) {
                    resolved
                        .insert(field.synced(), value.clone())
                        .map_err(value_error)?;
                    loaded.insert(field);
                }
            }
            skipped = snapshot.unrecognized();
            if snapshot.is_newer_format() {
                issue = Some(ResumeIssue::VersionMismatch {
                    found: snapshot.version(),
                    supported: FORMAT_VERSION,
                    skipped: skipped.clone(),
                });
            }
        }

        let mut record = TorrentRecord::loaded(id, &resolved).map_err(value_error)?;
        if overrides_diverge(stored.as_ref(), overridden, &resolved) {
            record.mark_unsaved();
        }

        log_load(id, loaded, issue.as_ref());
        Ok(LoadOutcome {
            record,
            loaded,
            overridden,
            issue,
            skipped,
        })
    }

    /// Persist every resolved persisted field of `record`.
    ///
    /// On failure the previously stored snapshot stays in place and `record`
    /// is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ResumeError::Encode`] or [`ResumeError::Io`].
    pub fn save(&self, record: &TorrentRecord) -> ResumeResult<()> {
        let id = record.id();
        let snapshot = ResumeSnapshot::from_record(record);
        let bytes = self
            .codec
            .encode(&snapshot)
            .map_err(|source| ResumeError::Encode {
                torrent_id: id,
                source,
            })?;
        self.storage.replace(id, &bytes).map_err(|source| {
            warn!(torrent_id = %id, error = %source, "resume snapshot save failed");
            ResumeError::Io {
                operation: "save",
                torrent_id: id,
                source,
            }
        })?;
        debug!(torrent_id = %id, fields = snapshot.len(), "resume snapshot saved");
        Ok(())
    }

    /// Delete the stored snapshot for `id`; deleting nothing succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`ResumeError::Io`] if the storage refuses the deletion.
    pub fn remove(&self, id: Uuid) -> ResumeResult<()> {
        self.storage
            .remove(id)
            .map_err(|source| ResumeError::Io {
                operation: "remove",
                torrent_id: id,
                source,
            })?;
        debug!(torrent_id = %id, "resume snapshot removed");
        Ok(())
    }
}

fn overrides_diverge(
    stored: Option<&ResumeSnapshot>,
    overridden: ResumeMask,
    resolved: &Snapshot,
) -> bool {
    overridden.iter().any(|field: ResumeField| {
        let on_disk: Option<&FieldValue> = stored.and_then(|snapshot| snapshot.get(field));
        match (on_disk, resolved.get(field.synced())) {
            (Some(previous), Some(current)) => !previous.is_identical(current),
            _ => true,
        }
    })
}

fn log_load(id: Uuid, loaded: ResumeMask, issue: Option<&ResumeIssue>) {
    let fields = loaded.keys().join(",");
    match issue {
        None => debug!(torrent_id = %id, fields = %fields, "resume data loaded"),
        Some(ResumeIssue::NotFound) => {
            debug!(torrent_id = %id, fields = %fields, issue = "not_found", "no resume data");
        }
        Some(ResumeIssue::Corrupt { source }) => warn!(
            torrent_id = %id,
            fields = %fields,
            issue = "corrupt",
            error = %source,
            "resume data unreadable; continuing without it"
        ),
        Some(ResumeIssue::VersionMismatch {
            found, skipped, ..
        }) => warn!(
            torrent_id = %id,
            fields = %fields,
            issue = "version_mismatch",
            found,
            skipped = skipped.len(),
            "resume data written by a newer format"
        ),
        Some(ResumeIssue::Io { source }) => warn!(
            torrent_id = %id,
            fields = %fields,
            issue = "io",
            error = %source,
            "resume data could not be read; continuing without it"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::{FieldOverrides, NoOverrides};
    use crate::storage::MemoryResumeStorage;
    use anyhow::Result;
    use stasis_core::TorrentField;

    fn memory_store() -> ResumeStore<MemoryResumeStorage, JsonResumeCodec> {
        ResumeStore::new(MemoryResumeStorage::new(), JsonResumeCodec)
    }

    #[test]
    fn missing_snapshot_loads_only_overrides() -> Result<()> {
        let store = memory_store();
        let id = Uuid::new_v4();
        let overrides = FieldOverrides::new().with(ResumeField::Name, "fresh")?;
        let outcome = store.load(id, ResumeMask::all(), &overrides)?;

        assert_eq!(outcome.loaded, ResumeMask::only(ResumeField::Name));
        assert!(matches!(outcome.issue, Some(ResumeIssue::NotFound)));
        assert_eq!(outcome.label(), "not_found");
        assert_eq!(outcome.record.name(), Some("fresh"));
        assert_eq!(outcome.record.persist_generation(), 1);
        Ok(())
    }

    #[test]
    fn unrequested_fields_are_not_loaded() -> Result<()> {
        let store = memory_store();
        let id = Uuid::new_v4();
        let mut record = TorrentRecord::new(id);
        record.apply(
            &Snapshot::new()
                .with(TorrentField::Name, "stored")?
                .with(TorrentField::DownloadedEver, 9_u64)?,
        )?;
        store.save(&record)?;

        let requested = ResumeMask::only(ResumeField::Downloaded);
        let outcome = store.load(id, requested, &NoOverrides)?;
        assert_eq!(outcome.loaded, requested);
        assert_eq!(outcome.record.name(), None);
        assert_eq!(outcome.unresolved(ResumeMask::all()), ResumeMask::all() - requested);
        assert_eq!(outcome.record.persist_generation(), 0);
        Ok(())
    }

    #[test]
    fn identical_override_does_not_mark_unsaved() -> Result<()> {
        let store = memory_store();
        let id = Uuid::new_v4();
        let mut record = TorrentRecord::new(id);
        record.apply(&Snapshot::new().with(TorrentField::DownloadDir, "/data")?)?;
        store.save(&record)?;

        let same = FieldOverrides::new().with(ResumeField::DownloadDir, "/data")?;
        assert_eq!(store.load(id, ResumeMask::all(), &same)?.record.persist_generation(), 0);

        let moved = FieldOverrides::new().with(ResumeField::DownloadDir, "/elsewhere")?;
        assert_eq!(store.load(id, ResumeMask::all(), &moved)?.record.persist_generation(), 1);
        Ok(())
    }

    #[test]
    fn strict_outcome_escalates_only_io() -> Result<()> {
        let store = memory_store();
        let outcome = store.load(Uuid::new_v4(), ResumeMask::all(), &NoOverrides)?;
        assert!(outcome.into_strict().is_ok());

        let record = TorrentRecord::new(Uuid::new_v4());
        let outcome = LoadOutcome {
            record,
            loaded: ResumeMask::EMPTY,
            overridden: ResumeMask::EMPTY,
            issue: Some(ResumeIssue::Io {
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            }),
            skipped: Vec::new(),
        };
        let err = outcome.into_strict().expect_err("io must escalate");
        assert!(matches!(err, ResumeError::Io { operation: "load", .. }));
        Ok(())
    }

    #[test]
    fn remove_is_idempotent() -> Result<()> {
        let store = memory_store();
        let record = TorrentRecord::new(Uuid::new_v4());
        store.save(&record)?;
        store.remove(record.id())?;
        store.remove(record.id())?;
        assert!(matches!(
            store.read_snapshot(record.id()),
            Err(ResumeIssue::NotFound)
        ));
        Ok(())
    }
}
