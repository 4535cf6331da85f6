//! Field catalogs, masks, and values.
//!
//! # Design
//! - Two catalogs: [`ResumeField`] (durable) and [`TorrentField`] (live, a superset).
//! - [`FieldMask`] is the only place raw bit arithmetic happens.
//! - Values are tagged so a snapshot can be checked against the catalog's kinds.

pub mod catalog;
pub mod mask;
pub mod value;

pub use catalog::{FieldCatalog, ResumeField, TorrentField};
pub use mask::FieldMask;
pub use value::{FieldValue, IdleLimit, LimitMode, RatioLimit, SpeedLimit, ValueKind};

/// Mask over the persisted catalog.
pub type ResumeMask = FieldMask<ResumeField>;
/// Mask over the synced catalog.
pub type TorrentMask = FieldMask<TorrentField>;

impl ResumeMask {
    /// The synced fields backing this persisted selection.
    #[must_use]
    pub fn synced(self) -> TorrentMask {
        self.iter().map(ResumeField::synced).collect()
    }
}

impl TorrentMask {
    /// Synced fields that have a persisted counterpart.
    #[must_use]
    pub fn persisted_fields() -> Self {
        ResumeMask::all().synced()
    }
}
