//! Caller-supplied values that take precedence over persisted ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stasis_core::{FieldCatalog, FieldValue, ResumeField, SyncError, SyncResult};

/// Supplies override values, field by field.
///
/// Presence is decided per field: a field the source returns `Some` for is
/// resolved from the override and never read from the persisted snapshot.
pub trait OverrideSource {
    /// Override for `field`, if the caller supplied one.
    fn override_for(&self, field: ResumeField) -> Option<FieldValue>;
}

/// Source that overrides nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOverrides;

impl OverrideSource for NoOverrides {
    fn override_for(&self, _field: ResumeField) -> Option<FieldValue> {
        None
    }
}

/// Explicit per-field overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldOverrides {
    values: BTreeMap<ResumeField, FieldValue>,
}

impl FieldOverrides {
    /// No overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override `field` with `value`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::KindMismatch`] if `value` does not match the field's kind.
    pub fn set(&mut self, field: ResumeField, value: impl Into<FieldValue>) -> SyncResult<()> {
        let value = value.into();
        if value.kind() != field.kind() {
            return Err(SyncError::KindMismatch {
                field: field.key(),
                expected: field.kind(),
                actual: value.kind(),
            });
        }
        self.values.insert(field, value);
        Ok(())
    }

    /// Builder form of [`FieldOverrides::set`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::KindMismatch`] if `value` does not match the field's kind.
    pub fn with(mut self, field: ResumeField, value: impl Into<FieldValue>) -> SyncResult<Self> {
        self.set(field, value)?;
        Ok(self)
    }

    /// Whether no field is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl OverrideSource for FieldOverrides {
    fn override_for(&self, field: ResumeField) -> Option<FieldValue> {
        self.values.get(&field).cloned()
    }
}

impl<T: OverrideSource + ?Sized> OverrideSource for &T {
    fn override_for(&self, field: ResumeField) -> Option<FieldValue> {
        (**self).override_for(field)
    }
}

/// Options supplied when a torrent is added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddTorrentOptions {
    /// Display name to use until metadata says otherwise.
    pub name_hint: Option<String>,
    /// Final download directory.
    pub download_dir: Option<String>,
    /// Directory for incomplete data.
    pub incomplete_dir: Option<String>,
    /// Add without starting.
    pub start_paused: Option<bool>,
    /// Peer connection cap.
    pub peer_limit: Option<i64>,
    /// Bandwidth priority (-1 low, 0 normal, 1 high).
    pub bandwidth_priority: Option<i64>,
    /// User labels.
    pub labels: Option<Vec<String>>,
    /// Bandwidth group.
    pub group: Option<String>,
    /// Request pieces in order.
    pub sequential: Option<bool>,
    /// Per-file priorities.
    pub file_priorities: Option<Vec<i64>>,
    /// Per-file "do not download" flags.
    pub files_unwanted: Option<Vec<bool>>,
}

impl OverrideSource for AddTorrentOptions {
    fn override_for(&self, field: ResumeField) -> Option<FieldValue> {
        match field {
            ResumeField::Name => self.name_hint.clone().map(FieldValue::Text),
            ResumeField::DownloadDir => self.download_dir.clone().map(FieldValue::Text),
            ResumeField::IncompleteDir => self.incomplete_dir.clone().map(FieldValue::Text),
            ResumeField::Run => self.start_paused.map(|paused| FieldValue::Bool(!paused)),
            ResumeField::MaxPeers => self.peer_limit.map(FieldValue::Int),
            ResumeField::BandwidthPriority => self.bandwidth_priority.map(FieldValue::Int),
            ResumeField::Labels => self.labels.clone().map(FieldValue::TextList),
            ResumeField::Group => self.group.clone().map(FieldValue::Text),
            ResumeField::SequentialDownload => self.sequential.map(FieldValue::Bool),
            ResumeField::FilePriorities => self.file_priorities.clone().map(FieldValue::IntList),
            ResumeField::Dnd => self.files_unwanted.clone().map(FieldValue::BoolList),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_overrides_check_kinds() -> anyhow::Result<()> {
        let overrides = FieldOverrides::new().with(ResumeField::DownloadDir, "/srv")?;
        assert_eq!(
            overrides.override_for(ResumeField::DownloadDir),
            Some(FieldValue::Text("/srv".into()))
        );
        assert_eq!(overrides.override_for(ResumeField::Name), None);

        let mut overrides = overrides;
        assert!(overrides.set(ResumeField::MaxPeers, "many").is_err());
        Ok(())
    }

    #[test]
    fn add_options_map_onto_persisted_fields() {
        let options = AddTorrentOptions {
            start_paused: Some(true),
            peer_limit: Some(40),
            files_unwanted: Some(vec![false, true]),
            ..AddTorrentOptions::default()
        };
        assert_eq!(
            options.override_for(ResumeField::Run),
            Some(FieldValue::Bool(false))
        );
        assert_eq!(
            options.override_for(ResumeField::MaxPeers),
            Some(FieldValue::Int(40))
        );
        assert_eq!(
            options.override_for(ResumeField::Dnd),
            Some(FieldValue::BoolList(vec![false, true]))
        );
        assert_eq!(options.override_for(ResumeField::DownloadDir), None);
        assert_eq!(options.override_for(ResumeField::Downloaded), None);
    }

    #[test]
    fn every_add_option_matches_its_field_kind() {
        let options = AddTorrentOptions {
            name_hint: Some("n".into()),
            download_dir: Some("/d".into()),
            incomplete_dir: Some("/i".into()),
            start_paused: Some(false),
            peer_limit: Some(1),
            bandwidth_priority: Some(0),
            labels: Some(vec!["l".into()]),
            group: Some("g".into()),
            sequential: Some(true),
            file_priorities: Some(vec![0]),
            files_unwanted: Some(vec![false]),
        };
        for field in ResumeField::ALL {
            if let Some(value) = options.override_for(*field) {
                assert_eq!(value.kind(), field.kind(), "{}", field.key());
            }
        }
    }
}
