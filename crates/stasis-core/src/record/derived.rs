//! Derived attributes computed from primitive fields.
//!
//! Derived values are never stored next to the primitives. Each one carries its
//! dependency mask; a change to any dependency marks it stale and the next read
//! recomputes and caches it.

use serde::{Deserialize, Serialize};

use crate::fields::{TorrentField, TorrentMask};

/// What the engine is currently doing with a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    /// Paused by the user or never started.
    Stopped,
    /// Queued for verification.
    CheckWait,
    /// Verifying local data.
    Check,
    /// Queued for download.
    DownloadWait,
    /// Downloading.
    Download,
    /// Queued for seeding.
    SeedWait,
    /// Seeding.
    Seed,
    /// Status code this build does not recognize.
    Unknown,
}

impl Activity {
    /// Classify a raw engine status code.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Stopped,
            1 => Self::CheckWait,
            2 => Self::Check,
            3 => Self::DownloadWait,
            4 => Self::Download,
            5 => Self::SeedWait,
            6 => Self::Seed,
            _ => Self::Unknown,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::CheckWait => "queued_for_verification",
            Self::Check => "verifying",
            Self::DownloadWait => "queued_for_download",
            Self::Download => "downloading",
            Self::SeedWait => "queued_for_seeding",
            Self::Seed => "seeding",
            Self::Unknown => "unknown",
        }
    }

    /// Paused.
    #[must_use]
    pub const fn is_paused(self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Waiting for or running verification.
    #[must_use]
    pub const fn is_verifying(self) -> bool {
        matches!(self, Self::CheckWait | Self::Check)
    }

    /// Waiting in either transfer queue.
    #[must_use]
    pub const fn is_queued(self) -> bool {
        matches!(self, Self::DownloadWait | Self::SeedWait)
    }

    /// Actively transferring.
    #[must_use]
    pub const fn is_ready_to_transfer(self) -> bool {
        matches!(self, Self::Download | Self::Seed)
    }
}

/// Attributes computed on demand from primitive fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedField {
    /// Verified plus unchecked bytes.
    HaveTotal,
    /// `have_total / total_size`.
    PercentComplete,
    /// Fraction of wanted bytes present.
    PercentDone,
    /// `uploaded_ever / size_when_done`.
    Ratio,
    /// Classification of the raw status code.
    Activity,
    /// Every byte of the payload is verified.
    IsSeed,
    /// No wanted bytes are missing.
    IsDone,
}

impl DerivedField {
    /// Every derived attribute.
    pub const ALL: [Self; 7] = [
        Self::HaveTotal,
        Self::PercentComplete,
        Self::PercentDone,
        Self::Ratio,
        Self::Activity,
        Self::IsSeed,
        Self::IsDone,
    ];

    const fn slot(self) -> usize {
        self as usize
    }

    /// Primitive fields this attribute is computed from.
    #[must_use]
    pub fn dependencies(self) -> TorrentMask {
        let fields: &[TorrentField] = match self {
            Self::HaveTotal => &[TorrentField::HaveVerified, TorrentField::HaveUnchecked],
            Self::PercentComplete => &[
                TorrentField::HaveVerified,
                TorrentField::HaveUnchecked,
                TorrentField::TotalSize,
            ],
            Self::PercentDone => &[TorrentField::LeftUntilDone, TorrentField::SizeWhenDone],
            Self::Ratio => &[TorrentField::UploadedEver, TorrentField::SizeWhenDone],
            Self::Activity => &[TorrentField::Status],
            Self::IsSeed => &[TorrentField::HaveVerified, TorrentField::TotalSize],
            Self::IsDone => &[TorrentField::LeftUntilDone],
        };
        fields.iter().copied().collect()
    }
}

/// Computed value of a derived attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DerivedValue {
    /// Byte count.
    Bytes(u64),
    /// Fraction or ratio.
    Fraction(f64),
    /// Activity classification.
    Activity(Activity),
    /// Boolean predicate.
    Flag(bool),
}

impl DerivedValue {
    /// Byte payload, if any.
    #[must_use]
    pub const fn as_bytes(self) -> Option<u64> {
        match self {
            Self::Bytes(value) => Some(value),
            _ => None,
        }
    }

    /// Fraction payload, if any.
    #[must_use]
    pub const fn as_fraction(self) -> Option<f64> {
        match self {
            Self::Fraction(value) => Some(value),
            _ => None,
        }
    }

    /// Activity payload, if any.
    #[must_use]
    pub const fn as_activity(self) -> Option<Activity> {
        match self {
            Self::Activity(value) => Some(value),
            _ => None,
        }
    }

    /// Flag payload, if any.
    #[must_use]
    pub const fn as_flag(self) -> Option<bool> {
        match self {
            Self::Flag(value) => Some(value),
            _ => None,
        }
    }
}

/// Primitive readings a derived value is computed from.
pub(crate) trait PrimitiveSource {
    fn unsigned(&self, field: TorrentField) -> u64;
    fn signed(&self, field: TorrentField) -> i64;
}

/// Memoized derived values; `None` marks a stale slot.
#[derive(Debug, Clone, Default)]
pub(crate) struct DerivedCache {
    slots: [Option<DerivedValue>; DerivedField::ALL.len()],
    recomputations: u64,
}

impl DerivedCache {
    /// Mark every attribute depending on `changed` as stale.
    pub(crate) fn invalidate(&mut self, changed: TorrentMask) {
        for field in DerivedField::ALL {
            if field.dependencies().intersects(changed) {
                self.slots[field.slot()] = None;
            }
        }
    }

    pub(crate) fn is_stale(&self, field: DerivedField) -> bool {
        self.slots[field.slot()].is_none()
    }

    pub(crate) const fn recomputations(&self) -> u64 {
        self.recomputations
    }

    pub(crate) fn get(&mut self, field: DerivedField, source: &impl PrimitiveSource) -> DerivedValue {
        if let Some(value) = self.slots[field.slot()] {
            return value;
        }
        let value = compute(field, source);
        self.slots[field.slot()] = Some(value);
        self.recomputations += 1;
        value
    }
}

fn compute(field: DerivedField, source: &impl PrimitiveSource) -> DerivedValue {
    let have_total = || {
        source
            .unsigned(TorrentField::HaveVerified)
            .saturating_add(source.unsigned(TorrentField::HaveUnchecked))
    };
    match field {
        DerivedField::HaveTotal => DerivedValue::Bytes(have_total()),
        DerivedField::PercentComplete => DerivedValue::Fraction(fraction(
            have_total(),
            source.unsigned(TorrentField::TotalSize),
        )),
        DerivedField::PercentDone => {
            let size = source.unsigned(TorrentField::SizeWhenDone);
            let left = source.unsigned(TorrentField::LeftUntilDone);
            DerivedValue::Fraction(fraction(size.saturating_sub(left), size))
        }
        DerivedField::Ratio => DerivedValue::Fraction(fraction(
            source.unsigned(TorrentField::UploadedEver),
            source.unsigned(TorrentField::SizeWhenDone),
        )),
        DerivedField::Activity => {
            DerivedValue::Activity(Activity::from_code(source.signed(TorrentField::Status)))
        }
        DerivedField::IsSeed => DerivedValue::Flag(
            source.unsigned(TorrentField::HaveVerified) >= source.unsigned(TorrentField::TotalSize),
        ),
        DerivedField::IsDone => DerivedValue::Flag(source.unsigned(TorrentField::LeftUntilDone) == 0),
    }
}

fn fraction(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        to_f64(numerator) / to_f64(denominator)
    }
}

#[allow(clippy::cast_precision_loss)]
const fn to_f64(value: u64) -> f64 {
    value as f64
}
