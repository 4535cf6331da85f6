//! Partial attribute snapshots produced by the engine.

use std::collections::BTreeMap;

use crate::error::{SyncError, SyncResult};
use crate::fields::{FieldCatalog, FieldValue, TorrentField, TorrentMask};

/// A partial mapping of synced fields to values.
///
/// A field absent from the snapshot means "unchanged", never "reset".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    values: BTreeMap<TorrentField, FieldValue>,
}

impl Snapshot {
    /// Empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any earlier value for the same field.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::KindMismatch`] if `value` does not match the field's kind.
    pub fn insert(
        &mut self,
        field: TorrentField,
        value: impl Into<FieldValue>,
    ) -> SyncResult<Option<FieldValue>> {
        let value = value.into();
        if value.kind() != field.kind() {
            return Err(SyncError::KindMismatch {
                field: field.key(),
                expected: field.kind(),
                actual: value.kind(),
            });
        }
        Ok(self.values.insert(field, value))
    }

    /// Builder form of [`Snapshot::insert`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::KindMismatch`] if `value` does not match the field's kind.
    pub fn with(mut self, field: TorrentField, value: impl Into<FieldValue>) -> SyncResult<Self> {
        self.insert(field, value)?;
        Ok(self)
    }

    /// Value for `field`, if present.
    #[must_use]
    pub fn get(&self, field: TorrentField) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    /// Fields present in the snapshot.
    #[must_use]
    pub fn fields(&self) -> TorrentMask {
        self.values.keys().copied().collect()
    }

    /// Number of fields present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the snapshot carries no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate present fields in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (TorrentField, &FieldValue)> {
        self.values.iter().map(|(field, value)| (*field, value))
    }

    /// Keep only the fields in `mask`.
    pub fn retain(&mut self, mask: TorrentMask) {
        self.values.retain(|field, _| mask.contains(*field));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::ValueKind;

    #[test]
    fn insert_checks_kind() {
        let mut snapshot = Snapshot::new();
        let err = snapshot
            .insert(TorrentField::Name, 5_u64)
            .expect_err("name takes text");
        assert_eq!(
            err,
            SyncError::KindMismatch {
                field: "name",
                expected: ValueKind::Text,
                actual: ValueKind::UInt,
            }
        );
        assert!(snapshot.is_empty());
    }

    #[test]
    fn builder_collects_fields() -> anyhow::Result<()> {
        let snapshot = Snapshot::new()
            .with(TorrentField::Name, "ubuntu")?
            .with(TorrentField::TotalSize, 1_024_u64)?;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot.fields(),
            TorrentMask::only(TorrentField::Name).with(TorrentField::TotalSize)
        );
        assert_eq!(
            snapshot.get(TorrentField::TotalSize),
            Some(&FieldValue::UInt(1_024))
        );
        Ok(())
    }

    #[test]
    fn retain_drops_fields_outside_mask() -> anyhow::Result<()> {
        let mut snapshot = Snapshot::new()
            .with(TorrentField::Name, "a")?
            .with(TorrentField::Eta, -1_i64)?;
        snapshot.retain(TorrentMask::only(TorrentField::Eta));
        assert_eq!(snapshot.fields(), TorrentMask::only(TorrentField::Eta));
        Ok(())
    }
}
