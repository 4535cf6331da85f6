#![forbid(unsafe_code)]
#![warn(
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Selective, crash-safe persistence of torrent resume snapshots.
//!
//! [`ResumeStore`] merges caller overrides with a stored snapshot into a
//! [`stasis_core::TorrentRecord`] and writes records back through a
//! [`ResumeStorage`] using a [`ResumeCodec`].

/// Versioned snapshot encoding.
pub mod codec;
/// Error and diagnostic types.
pub mod error;
/// Caller-supplied values that win over stored ones.
pub mod overrides;
/// Byte storage backends.
pub mod storage;
/// Load/save orchestration.
pub mod store;

pub use codec::{FORMAT_VERSION, JsonResumeCodec, ResumeCodec, ResumeSnapshot};
pub use error::{CodecError, ResumeError, ResumeIssue, ResumeResult};
pub use overrides::{AddTorrentOptions, FieldOverrides, NoOverrides, OverrideSource};
pub use storage::{FsResumeStorage, MemoryResumeStorage, ResumeStorage};
pub use store::{LoadOutcome, ResumeStore};
