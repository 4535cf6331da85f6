//! # Design
//!
//! - Hard failures (`ResumeError`) carry operation context and the source error.
//! - Degradations observed while loading (`ResumeIssue`) are data, not errors: the
//!   caller decides whether an unreadable snapshot should block a torrent.

use std::io;

use stasis_core::SyncError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for resume operations.
pub type ResumeResult<T> = Result<T, ResumeError>;

/// Failures surfaced by the resume store.
#[derive(Debug, Error)]
pub enum ResumeError {
    /// The storage collaborator failed.
    #[error("resume storage failure")]
    Io {
        /// Operation that hit the failure.
        operation: &'static str,
        /// Torrent whose snapshot was involved.
        torrent_id: Uuid,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The snapshot could not be encoded.
    #[error("resume snapshot encoding failed")]
    Encode {
        /// Torrent whose snapshot was being encoded.
        torrent_id: Uuid,
        /// Underlying codec error.
        #[source]
        source: CodecError,
    },
    /// A resolved value did not fit its field.
    #[error("resume value rejected")]
    Value {
        /// Torrent being loaded.
        torrent_id: Uuid,
        /// Underlying record error.
        #[source]
        source: SyncError,
    },
}

/// Decoding outcomes that mean "nothing usable".
#[derive(Debug, Error)]
pub enum CodecError {
    /// No bytes were present.
    #[error("resume snapshot absent")]
    Absent,
    /// Bytes were present but could not be interpreted.
    #[error("resume snapshot corrupt")]
    Corrupt {
        /// Underlying parse failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CodecError {
    pub(crate) fn corrupt(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Corrupt {
            source: source.into(),
        }
    }
}

/// Why a load fell back to fewer persisted values than requested.
#[derive(Debug)]
pub enum ResumeIssue {
    /// No snapshot exists for the torrent.
    NotFound,
    /// The snapshot could not be decoded.
    Corrupt {
        /// Underlying codec error.
        source: CodecError,
    },
    /// The snapshot was written by a newer format; unrecognized entries were skipped.
    VersionMismatch {
        /// Version found on disk.
        found: u32,
        /// Newest version this build writes.
        supported: u32,
        /// Keys that were not applied.
        skipped: Vec<String>,
    },
    /// The storage collaborator failed for a reason other than absence.
    Io {
        /// Underlying IO error.
        source: io::Error,
    },
}

impl ResumeIssue {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Corrupt { .. } => "corrupt",
            Self::VersionMismatch { .. } => "version_mismatch",
            Self::Io { .. } => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn errors_keep_constant_messages_and_sources() {
        let err = ResumeError::Io {
            operation: "save",
            torrent_id: Uuid::nil(),
            source: io::Error::other("disk full"),
        };
        assert_eq!(err.to_string(), "resume storage failure");
        assert!(err.source().is_some());

        let corrupt = CodecError::corrupt("bad bytes");
        assert_eq!(corrupt.to_string(), "resume snapshot corrupt");
        assert!(corrupt.source().is_some());
    }

    #[test]
    fn issue_labels_are_stable() {
        assert_eq!(ResumeIssue::NotFound.as_str(), "not_found");
        assert_eq!(
            ResumeIssue::Io {
                source: io::Error::other("x")
            }
            .as_str(),
            "io"
        );
        assert_eq!(
            ResumeIssue::VersionMismatch {
                found: 9,
                supported: 1,
                skipped: Vec::new(),
            }
            .as_str(),
            "version_mismatch"
        );
    }
}
