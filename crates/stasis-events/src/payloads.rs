//! Event payload types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned to each published event.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Notifications emitted while torrents are tracked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A torrent was registered and its resume data resolved.
    TorrentAdded {
        /// Torrent identifier.
        torrent_id: Uuid,
        /// Display name, when known at add time.
        name: Option<String>,
        /// Keys of the persisted fields restored from overrides or disk.
        loaded: Vec<String>,
        /// `restored` or the reason resume data was unavailable.
        resume: String,
    },
    /// Fields of a tracked torrent changed since the previous notification.
    FieldsChanged {
        /// Torrent identifier.
        torrent_id: Uuid,
        /// Keys of the changed fields, in catalog order.
        fields: Vec<String>,
    },
    /// A resume snapshot was written.
    ResumeSaved {
        /// Torrent identifier.
        torrent_id: Uuid,
        /// Persist generation captured by the snapshot.
        generation: u64,
    },
    /// A resume snapshot could not be written or deleted.
    ResumeFailed {
        /// Torrent identifier.
        torrent_id: Uuid,
        /// Operation that failed.
        operation: String,
        /// Rendered error chain.
        message: String,
    },
    /// A torrent stopped being tracked.
    TorrentRemoved {
        /// Torrent identifier.
        torrent_id: Uuid,
        /// Whether its resume snapshot was deleted.
        resume_deleted: bool,
    },
    /// The set of degraded components changed.
    HealthChanged {
        /// Components currently degraded.
        degraded: Vec<String>,
    },
}

impl Event {
    /// Machine-friendly discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TorrentAdded { .. } => "torrent_added",
            Self::FieldsChanged { .. } => "fields_changed",
            Self::ResumeSaved { .. } => "resume_saved",
            Self::ResumeFailed { .. } => "resume_failed",
            Self::TorrentRemoved { .. } => "torrent_removed",
            Self::HealthChanged { .. } => "health_changed",
        }
    }

    /// Torrent the event concerns, if any.
    #[must_use]
    pub const fn torrent_id(&self) -> Option<Uuid> {
        match self {
            Self::TorrentAdded { torrent_id, .. }
            | Self::FieldsChanged { torrent_id, .. }
            | Self::ResumeSaved { torrent_id, .. }
            | Self::ResumeFailed { torrent_id, .. }
            | Self::TorrentRemoved { torrent_id, .. } => Some(*torrent_id),
            Self::HealthChanged { .. } => None,
        }
    }
}

/// Event plus its id and emission time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission timestamp.
    pub timestamp: DateTime<Utc>,
    /// Payload.
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_ids_map_per_variant() {
        let id = Uuid::from_u128(7);
        let cases = [
            (
                Event::TorrentAdded {
                    torrent_id: id,
                    name: None,
                    loaded: Vec::new(),
                    resume: "not_found".into(),
                },
                "torrent_added",
            ),
            (
                Event::FieldsChanged {
                    torrent_id: id,
                    fields: vec!["name".into()],
                },
                "fields_changed",
            ),
            (
                Event::ResumeSaved {
                    torrent_id: id,
                    generation: 3,
                },
                "resume_saved",
            ),
            (
                Event::ResumeFailed {
                    torrent_id: id,
                    operation: "save".into(),
                    message: "disk full".into(),
                },
                "resume_failed",
            ),
            (
                Event::TorrentRemoved {
                    torrent_id: id,
                    resume_deleted: true,
                },
                "torrent_removed",
            ),
        ];
        for (event, kind) in cases {
            assert_eq!(event.kind(), kind);
            assert_eq!(event.torrent_id(), Some(id));
        }

        let health = Event::HealthChanged {
            degraded: vec!["resume_store".into()],
        };
        assert_eq!(health.kind(), "health_changed");
        assert_eq!(health.torrent_id(), None);
    }

    #[test]
    fn events_serialize_with_type_tag() -> Result<(), serde_json::Error> {
        let event = Event::FieldsChanged {
            torrent_id: Uuid::nil(),
            fields: vec!["downloaded".into(), "status".into()],
        };
        let json = serde_json::to_value(&event)?;
        assert_eq!(json["type"], "fields_changed");
        assert_eq!(json["fields"][1], "status");
        Ok(())
    }
}
