//! Versioned byte encoding of persisted field values.
//!
//! Snapshots are keyed by each field's stable key, never by bit position. A
//! snapshot written by a newer build decodes leniently: entries this build cannot
//! interpret are skipped and reported instead of failing the whole read.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stasis_core::{FieldCatalog, FieldValue, ResumeField, SyncError, SyncResult, TorrentRecord};

use crate::error::CodecError;

/// Format version written by this build.
pub const FORMAT_VERSION: u32 = 1;

/// Persisted field values plus the format version they were written with.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumeSnapshot {
    version: u32,
    fields: BTreeMap<String, FieldValue>,
    skipped: Vec<String>,
}

impl Default for ResumeSnapshot {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            fields: BTreeMap::new(),
            skipped: Vec::new(),
        }
    }
}

impl ResumeSnapshot {
    /// Empty snapshot at the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture every resolved persisted field of `record`.
    #[must_use]
    pub fn from_record(record: &TorrentRecord) -> Self {
        let fields = record
            .persisted_values()
            .map(|(field, value)| (field.key().to_owned(), value.clone()))
            .collect();
        Self {
            fields,
            ..Self::default()
        }
    }

    /// Format version the snapshot was written with.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Whether the snapshot came from a newer build.
    #[must_use]
    pub const fn is_newer_format(&self) -> bool {
        self.version > FORMAT_VERSION
    }

    /// Stored value for `field`, if present and of the field's kind.
    #[must_use]
    pub fn get(&self, field: ResumeField) -> Option<&FieldValue> {
        self.fields
            .get(field.key())
            .filter(|value| value.kind() == field.kind())
    }

    /// Store a value for `field`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::KindMismatch`] if `value` does not match the field's kind.
    pub fn insert(
        &mut self,
        field: ResumeField,
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
        Ok(self.fields.insert(field.key().to_owned(), value))
    }

    /// Stored keys in lexical order, including ones this build does not know.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Stored entries in key order, including ones this build does not know.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keys that were present on disk but could not be interpreted, plus keys
    /// unknown to the persisted catalog.
    #[must_use]
    pub fn unrecognized(&self) -> Vec<String> {
        let mut keys = self.skipped.clone();
        keys.extend(
            self.fields
                .iter()
                .filter(|(key, value)| {
                    ResumeField::from_key(key).is_none_or(|field| field.kind() != value.kind())
                })
                .map(|(key, _)| key.clone()),
        );
        keys.sort_unstable();
        keys
    }
}

/// Encodes and decodes [`ResumeSnapshot`]s.
pub trait ResumeCodec: Send + Sync {
    /// Serialize a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Corrupt`] if the snapshot cannot be represented.
    fn encode(&self, snapshot: &ResumeSnapshot) -> Result<Vec<u8>, CodecError>;

    /// Parse bytes previously produced by [`ResumeCodec::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Absent`] for empty input and [`CodecError::Corrupt`]
    /// for anything that cannot be interpreted.
    fn decode(&self, bytes: &[u8]) -> Result<ResumeSnapshot, CodecError>;
}

/// JSON encoding: `{"version": 1, "fields": {"<key>": {"type": ..., "value": ...}}}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResumeCodec;

#[derive(Serialize)]
struct WireOut<'a> {
    version: u32,
    fields: &'a BTreeMap<String, FieldValue>,
}

#[derive(Deserialize)]
struct WireIn {
    version: u32,
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
}

impl ResumeCodec for JsonResumeCodec {
    fn encode(&self, snapshot: &ResumeSnapshot) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec_pretty(&WireOut {
            version: snapshot.version,
            fields: &snapshot.fields,
        })
        .map_err(CodecError::corrupt)
    }

    fn decode(&self, bytes: &[u8]) -> Result<ResumeSnapshot, CodecError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(CodecError::Absent);
        }
        let wire: WireIn = serde_json::from_slice(bytes).map_err(CodecError::corrupt)?;
        if wire.version == 0 {
            return Err(CodecError::corrupt("format version 0 is not valid"));
        }

        let lenient = wire.version > FORMAT_VERSION;
        let mut snapshot = ResumeSnapshot {
            version: wire.version,
            ..ResumeSnapshot::default()
        };
        for (key, raw) in wire.fields {
            match serde_json::from_value::<FieldValue>(raw) {
                Ok(value) => {
                    snapshot.fields.insert(key, value);
                }
                Err(_) if lenient => snapshot.skipped.push(key),
                Err(err) => return Err(CodecError::corrupt(err)),
            }
        }
        Ok(snapshot)
    }
}
