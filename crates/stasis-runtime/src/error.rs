//! # Design
//!
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors from the resume and sync layers unchanged.

use std::io;
use std::path::PathBuf;

use stasis_core::SyncError;
use stasis_resume::ResumeError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Runtime-level error type.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The torrent is already tracked or being added.
    #[error("torrent is already tracked")]
    AlreadyTracked {
        /// Torrent identifier.
        torrent_id: Uuid,
    },
    /// The torrent is not tracked.
    #[error("torrent is not tracked")]
    UnknownTorrent {
        /// Torrent identifier.
        torrent_id: Uuid,
    },
    /// The torrent was removed before its resume data finished loading.
    #[error("torrent was removed while loading")]
    AddCancelled {
        /// Torrent identifier.
        torrent_id: Uuid,
    },
    /// Resume persistence failed.
    #[error("resume operation failed")]
    Resume {
        /// Operation identifier.
        operation: &'static str,
        /// Source resume error.
        #[source]
        source: ResumeError,
    },
    /// Record synchronization failed.
    #[error("record synchronization failed")]
    Sync {
        /// Operation identifier.
        operation: &'static str,
        /// Source sync error.
        #[source]
        source: SyncError,
    },
    /// The resume directory could not be prepared.
    #[error("resume directory could not be prepared")]
    Storage {
        /// Directory involved.
        path: PathBuf,
        /// Source IO error.
        #[source]
        source: io::Error,
    },
    /// A blocking task panicked or was cancelled.
    #[error("background task failed")]
    Join {
        /// Operation identifier.
        operation: &'static str,
        /// Source join error.
        #[source]
        source: tokio::task::JoinError,
    },
    /// A background worker is no longer running.
    #[error("background worker stopped")]
    WorkerStopped {
        /// Worker name.
        worker: &'static str,
    },
}

impl RuntimeError {
    pub(crate) fn sync(operation: &'static str) -> impl Fn(SyncError) -> Self {
        move |source| Self::Sync { operation, source }
    }

    pub(crate) fn resume(operation: &'static str) -> impl Fn(ResumeError) -> Self {
        move |source| Self::Resume { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn messages_stay_constant_and_sources_chain() {
        let err = RuntimeError::sync("apply")(SyncError::RecordRemoved {
            torrent_id: Uuid::nil(),
        });
        assert_eq!(err.to_string(), "record synchronization failed");
        assert_eq!(
            err.source().map(ToString::to_string),
            Some("torrent record was removed".to_string())
        );

        let err = RuntimeError::WorkerStopped {
            worker: "checkpointer",
        };
        assert_eq!(err.to_string(), "background worker stopped");
    }
}
