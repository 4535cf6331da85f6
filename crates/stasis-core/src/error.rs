//! Error types for record synchronization.

use thiserror::Error;
use uuid::Uuid;

use crate::fields::ValueKind;

/// Primary error type for record operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    /// A value did not match the shape its field declares.
    #[error("field value has the wrong kind")]
    KindMismatch {
        /// Stable key of the field.
        field: &'static str,
        /// Kind declared by the catalog.
        expected: ValueKind,
        /// Kind that was supplied.
        actual: ValueKind,
    },
    /// The record was removed and no longer accepts updates.
    #[error("torrent record was removed")]
    RecordRemoved {
        /// Identifier of the removed torrent.
        torrent_id: Uuid,
    },
    /// A writer panicked while holding the record lock.
    #[error("torrent record lock poisoned")]
    LockPoisoned {
        /// Identifier of the affected torrent.
        torrent_id: Uuid,
    },
}

/// Convenience alias for record operation results.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_stay_constant() {
        let err = SyncError::KindMismatch {
            field: "name",
            expected: ValueKind::Text,
            actual: ValueKind::Int,
        };
        assert_eq!(err.to_string(), "field value has the wrong kind");

        let removed = SyncError::RecordRemoved {
            torrent_id: Uuid::nil(),
        };
        assert_eq!(removed.to_string(), "torrent record was removed");
    }
}
