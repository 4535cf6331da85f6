//! Canonical in-memory state for one torrent and the sync protocol that mutates it.
//!
//! # Design
//! - Primitive values change only through [`TorrentRecord::apply`] (and its
//!   load/default wrappers), which diffs by exact equality.
//! - Changes accumulate in a dirty-mask that observers drain with
//!   [`TorrentRecord::consume_dirty`].
//! - Derived attributes are memoized per record and invalidated by dependency.

pub mod derived;
pub mod handle;
pub mod snapshot;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::fields::{FieldCatalog, FieldValue, ResumeField, TorrentField, TorrentMask};

pub use derived::{Activity, DerivedField, DerivedValue};
pub use handle::{Observation, RecordHandle};
pub use snapshot::Snapshot;

use derived::{DerivedCache, PrimitiveSource};

const FIELD_SLOTS: usize = 64;

/// Lifecycle of a [`TorrentRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPhase {
    /// Created, nothing resolved yet.
    Uninitialized,
    /// Populated from overrides and resume data; defaults still pending.
    PartiallyLoaded,
    /// Defaults filled; receiving engine snapshots.
    Live,
    /// Terminal; the torrent was removed.
    Removed,
}

impl RecordPhase {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::PartiallyLoaded => "partially_loaded",
            Self::Live => "live",
            Self::Removed => "removed",
        }
    }
}

#[derive(Debug, Clone)]
struct FieldValues {
    slots: [Option<FieldValue>; FIELD_SLOTS],
}

impl Default for FieldValues {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }
}

impl FieldValues {
    fn get(&self, field: TorrentField) -> Option<&FieldValue> {
        self.slots[field.bit() as usize].as_ref()
    }

    fn slot_mut(&mut self, field: TorrentField) -> &mut Option<FieldValue> {
        &mut self.slots[field.bit() as usize]
    }
}

impl PrimitiveSource for FieldValues {
    fn unsigned(&self, field: TorrentField) -> u64 {
        self.get(field)
            .and_then(FieldValue::as_u64)
            .unwrap_or_default()
    }

    fn signed(&self, field: TorrentField) -> i64 {
        self.get(field)
            .and_then(FieldValue::as_i64)
            .unwrap_or_default()
    }
}

/// Authoritative in-memory state for one torrent.
#[derive(Debug, Clone)]
pub struct TorrentRecord {
    id: Uuid,
    phase: RecordPhase,
    values: FieldValues,
    dirty: TorrentMask,
    persist_generation: u64,
    derived: DerivedCache,
}

impl TorrentRecord {
    /// Fresh record with nothing resolved.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            phase: RecordPhase::Uninitialized,
            values: FieldValues::default(),
            dirty: TorrentMask::EMPTY,
            persist_generation: 0,
            derived: DerivedCache::default(),
        }
    }

    /// Build a record from values resolved at load time.
    ///
    /// Every resolved field is reported dirty so the first observer pass sees it.
    /// The record starts in [`RecordPhase::PartiallyLoaded`] with a clean persist
    /// generation; call [`TorrentRecord::mark_unsaved`] when the resolved values
    /// differ from what is on disk.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`TorrentRecord::apply`].
    pub fn loaded(id: Uuid, resolved: &Snapshot) -> SyncResult<Self> {
        let mut record = Self::new(id);
        record.apply(resolved)?;
        record.phase = RecordPhase::PartiallyLoaded;
        record.persist_generation = 0;
        Ok(record)
    }

    /// Torrent identity.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> RecordPhase {
        self.phase
    }

    /// Current value of `field`, if it has been resolved.
    #[must_use]
    pub fn get(&self, field: TorrentField) -> Option<&FieldValue> {
        self.values.get(field)
    }

    /// Fields that currently hold a value.
    #[must_use]
    pub fn resolved(&self) -> TorrentMask {
        TorrentField::ALL
            .iter()
            .copied()
            .filter(|field| self.values.get(*field).is_some())
            .collect()
    }

    /// Current values of the persisted fields, keyed by their durable identity.
    pub fn persisted_values(&self) -> impl Iterator<Item = (ResumeField, &FieldValue)> {
        ResumeField::ALL
            .iter()
            .copied()
            .filter_map(|field| self.values.get(field.synced()).map(|value| (field, value)))
    }

    /// Counter bumped whenever a persisted field changes.
    ///
    /// Checkpointing compares it against the generation it last saved.
    #[must_use]
    pub const fn persist_generation(&self) -> u64 {
        self.persist_generation
    }

    /// Flag the record as differing from its stored snapshot.
    pub const fn mark_unsaved(&mut self) {
        self.persist_generation += 1;
    }

    /// Fields changed since the last [`TorrentRecord::consume_dirty`], without clearing.
    #[must_use]
    pub const fn pending_dirty(&self) -> TorrentMask {
        self.dirty
    }

    /// Apply a partial snapshot and return the fields whose value changed.
    ///
    /// Fields missing from `snapshot` are left untouched. Fields whose value is
    /// identical are excluded from the result. The result is unioned into the
    /// pending dirty-mask and invalidates dependent derived attributes.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RecordRemoved`] once the record has been removed.
    pub fn apply(&mut self, snapshot: &Snapshot) -> SyncResult<TorrentMask> {
        if self.phase == RecordPhase::Removed {
            return Err(SyncError::RecordRemoved {
                torrent_id: self.id,
            });
        }

        let mut changed = TorrentMask::EMPTY;
        for (field, value) in snapshot.iter() {
            let slot = self.values.slot_mut(field);
            if slot.as_ref().is_some_and(|current| current.is_identical(value)) {
                continue;
            }
            *slot = Some(value.clone());
            changed.insert(field);
        }

        if !changed.is_empty() {
            self.derived.invalidate(changed);
            self.dirty |= changed;
            if changed.intersects(TorrentMask::persisted_fields()) {
                self.persist_generation += 1;
            }
        }
        Ok(changed)
    }

    /// Fill still-unresolved fields from `defaults` and enter [`RecordPhase::Live`].
    ///
    /// Values in `defaults` for fields that already hold a value are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RecordRemoved`] once the record has been removed.
    pub fn go_live(&mut self, defaults: &Snapshot) -> SyncResult<TorrentMask> {
        let mut unresolved = defaults.clone();
        unresolved.retain(TorrentMask::all() - self.resolved());
        let changed = self.apply(&unresolved)?;
        self.phase = RecordPhase::Live;
        Ok(changed)
    }

    /// Read and clear the pending dirty-mask.
    pub fn consume_dirty(&mut self) -> TorrentMask {
        std::mem::take(&mut self.dirty)
    }

    /// Enter the terminal phase; later [`TorrentRecord::apply`] calls fail.
    pub const fn mark_removed(&mut self) {
        self.phase = RecordPhase::Removed;
    }

    /// Read a derived attribute, recomputing it if a dependency changed.
    pub fn derived(&mut self, field: DerivedField) -> DerivedValue {
        self.derived.get(field, &self.values)
    }

    /// Whether `field` will be recomputed on its next read.
    #[must_use]
    pub fn is_derived_stale(&self, field: DerivedField) -> bool {
        self.derived.is_stale(field)
    }

    /// How many derived values have been computed over the record's life.
    #[must_use]
    pub const fn derived_recomputations(&self) -> u64 {
        self.derived.recomputations()
    }

    /// Verified plus unchecked bytes.
    pub fn have_total(&mut self) -> u64 {
        self.derived(DerivedField::HaveTotal)
            .as_bytes()
            .unwrap_or_default()
    }

    /// Fraction of the payload present locally.
    pub fn percent_complete(&mut self) -> f64 {
        self.derived(DerivedField::PercentComplete)
            .as_fraction()
            .unwrap_or_default()
    }

    /// Fraction of wanted bytes present locally.
    pub fn percent_done(&mut self) -> f64 {
        self.derived(DerivedField::PercentDone)
            .as_fraction()
            .unwrap_or_default()
    }

    /// Upload ratio.
    pub fn ratio(&mut self) -> f64 {
        self.derived(DerivedField::Ratio)
            .as_fraction()
            .unwrap_or_default()
    }

    /// Activity classification of the raw status code.
    pub fn activity(&mut self) -> Activity {
        self.derived(DerivedField::Activity)
            .as_activity()
            .unwrap_or(Activity::Unknown)
    }

    /// Whether every payload byte is verified.
    pub fn is_seed(&mut self) -> bool {
        self.derived(DerivedField::IsSeed)
            .as_flag()
            .unwrap_or_default()
    }

    /// Whether no wanted bytes are missing.
    pub fn is_done(&mut self) -> bool {
        self.derived(DerivedField::IsDone)
            .as_flag()
            .unwrap_or_default()
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.get(TorrentField::Name).and_then(FieldValue::as_text)
    }

    /// Download directory.
    #[must_use]
    pub fn download_dir(&self) -> Option<&str> {
        self.get(TorrentField::DownloadDir)
            .and_then(FieldValue::as_text)
    }

    /// Unsigned reading of `field`, zero when unresolved.
    #[must_use]
    pub fn unsigned(&self, field: TorrentField) -> u64 {
        self.values.unsigned(field)
    }

    /// Timestamp reading of `field`.
    #[must_use]
    pub fn time(&self, field: TorrentField) -> Option<DateTime<Utc>> {
        self.get(field).and_then(FieldValue::as_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn live_record() -> Result<TorrentRecord> {
        let mut record = TorrentRecord::new(Uuid::new_v4());
        record.go_live(&Snapshot::new())?;
        record.consume_dirty();
        Ok(record)
    }

    #[test]
    fn new_record_is_uninitialized_and_clean() {
        let record = TorrentRecord::new(Uuid::nil());
        assert_eq!(record.phase(), RecordPhase::Uninitialized);
        assert!(record.resolved().is_empty());
        assert!(record.pending_dirty().is_empty());
        assert_eq!(record.persist_generation(), 0);
    }

    #[test]
    fn apply_reports_only_real_changes() -> Result<()> {
        let mut record = live_record()?;
        let first = Snapshot::new().with(TorrentField::DownloadedEver, 10_u64)?;
        assert_eq!(
            record.apply(&first)?,
            TorrentMask::only(TorrentField::DownloadedEver)
        );

        let second = Snapshot::new()
            .with(TorrentField::DownloadedEver, 10_u64)?
            .with(TorrentField::UploadedEver, 5_u64)?;
        assert_eq!(
            record.apply(&second)?,
            TorrentMask::only(TorrentField::UploadedEver)
        );
        Ok(())
    }

    #[test]
    fn apply_is_idempotent() -> Result<()> {
        let mut record = live_record()?;
        let snapshot = Snapshot::new()
            .with(TorrentField::Name, "debian.iso")?
            .with(TorrentField::RecheckProgress, 0.25)?;
        assert_eq!(record.apply(&snapshot)?.len(), 2);
        assert!(record.apply(&snapshot)?.is_empty());
        Ok(())
    }

    #[test]
    fn empty_snapshot_changes_nothing() -> Result<()> {
        let mut record = live_record()?;
        record.apply(&Snapshot::new().with(TorrentField::Name, "a")?)?;
        record.consume_dirty();
        let generation = record.persist_generation();

        assert!(record.apply(&Snapshot::new())?.is_empty());
        assert!(record.pending_dirty().is_empty());
        assert_eq!(record.persist_generation(), generation);
        assert_eq!(record.name(), Some("a"));
        Ok(())
    }

    #[test]
    fn omitted_fields_are_not_reset() -> Result<()> {
        let mut record = live_record()?;
        record.apply(&Snapshot::new().with(TorrentField::DownloadDir, "/data")?)?;
        record.apply(&Snapshot::new().with(TorrentField::Name, "x")?)?;
        assert_eq!(record.download_dir(), Some("/data"));
        Ok(())
    }

    #[test]
    fn dirty_mask_accumulates_until_consumed() -> Result<()> {
        let mut record = live_record()?;
        record.apply(&Snapshot::new().with(TorrentField::Name, "a")?)?;
        record.apply(&Snapshot::new().with(TorrentField::Eta, 30_i64)?)?;

        let consumed = record.consume_dirty();
        assert_eq!(
            consumed,
            TorrentMask::only(TorrentField::Name).with(TorrentField::Eta)
        );
        assert!(record.consume_dirty().is_empty());

        record.apply(&Snapshot::new().with(TorrentField::Eta, 29_i64)?)?;
        assert_eq!(record.consume_dirty(), TorrentMask::only(TorrentField::Eta));
        Ok(())
    }

    #[test]
    fn transient_changes_do_not_bump_persist_generation() -> Result<()> {
        let mut record = live_record()?;
        record.apply(&Snapshot::new().with(TorrentField::UploadSpeed, 100_u64)?)?;
        assert_eq!(record.persist_generation(), 0);
        record.apply(&Snapshot::new().with(TorrentField::UploadedEver, 100_u64)?)?;
        assert_eq!(record.persist_generation(), 1);
        Ok(())
    }

    #[test]
    fn derived_values_recompute_after_dependency_change() -> Result<()> {
        let mut record = live_record()?;
        record.apply(
            &Snapshot::new()
                .with(TorrentField::HaveVerified, 50_u64)?
                .with(TorrentField::TotalSize, 100_u64)?
                .with(TorrentField::Status, 4_i64)?,
        )?;

        assert!((record.percent_complete() - 0.5).abs() < f64::EPSILON);
        assert_eq!(record.activity(), Activity::Download);
        let computed = record.derived_recomputations();
        assert!((record.percent_complete() - 0.5).abs() < f64::EPSILON);
        assert_eq!(record.derived_recomputations(), computed);

        record.apply(&Snapshot::new().with(TorrentField::UploadSpeed, 9_u64)?)?;
        assert!(!record.is_derived_stale(DerivedField::PercentComplete));

        record.apply(&Snapshot::new().with(TorrentField::HaveUnchecked, 50_u64)?)?;
        assert!(record.is_derived_stale(DerivedField::PercentComplete));
        assert!(!record.is_derived_stale(DerivedField::Activity));
        assert!((record.percent_complete() - 1.0).abs() < f64::EPSILON);
        assert_eq!(record.have_total(), 100);
        Ok(())
    }

    #[test]
    fn loaded_record_is_partially_loaded_and_dirty() -> Result<()> {
        let resolved = Snapshot::new()
            .with(TorrentField::Name, "x")?
            .with(TorrentField::DownloadedEver, 10_u64)?;
        let record = TorrentRecord::loaded(Uuid::nil(), &resolved)?;
        assert_eq!(record.phase(), RecordPhase::PartiallyLoaded);
        assert_eq!(record.pending_dirty(), resolved.fields());
        assert_eq!(record.persist_generation(), 0);
        assert_eq!(record.persisted_values().count(), 2);
        Ok(())
    }

    #[test]
    fn go_live_only_fills_unresolved_fields() -> Result<()> {
        let resolved = Snapshot::new().with(TorrentField::DownloadDir, "/override")?;
        let mut record = TorrentRecord::loaded(Uuid::nil(), &resolved)?;
        record.consume_dirty();

        let defaults = Snapshot::new()
            .with(TorrentField::DownloadDir, "/default")?
            .with(TorrentField::PeerLimit, 50_i64)?;
        let filled = record.go_live(&defaults)?;

        assert_eq!(filled, TorrentMask::only(TorrentField::PeerLimit));
        assert_eq!(record.download_dir(), Some("/override"));
        assert_eq!(record.phase(), RecordPhase::Live);
        Ok(())
    }

    #[test]
    fn removed_record_rejects_updates() -> Result<()> {
        let mut record = live_record()?;
        record.mark_removed();
        let err = record
            .apply(&Snapshot::new().with(TorrentField::Name, "late")?)
            .expect_err("removed records are terminal");
        assert!(matches!(err, SyncError::RecordRemoved { .. }));
        assert_eq!(record.name(), None);
        Ok(())
    }
}
