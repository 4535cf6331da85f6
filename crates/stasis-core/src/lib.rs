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

//! Engine-agnostic torrent state: field catalogs, masks, and synchronized records.
//!
//! Layout: `fields/` (catalogs, masks, values), `record/` (records, snapshots,
//! derived attributes, shared handles), `error.rs` (sync errors).

pub mod error;
pub mod fields;
pub mod record;

pub use error::{SyncError, SyncResult};
pub use fields::{
    FieldCatalog, FieldMask, FieldValue, IdleLimit, LimitMode, RatioLimit, ResumeField,
    ResumeMask, SpeedLimit, TorrentField, TorrentMask, ValueKind,
};
pub use record::{
    Activity, DerivedField, DerivedValue, Observation, RecordHandle, RecordPhase, Snapshot,
    TorrentRecord,
};
