//! Typed attribute values carried by torrent records and resume snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shape of a value accepted by a catalog field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Boolean flag.
    Bool,
    /// Signed integer.
    Int,
    /// Unsigned integer (byte counts, durations).
    UInt,
    /// Floating point fraction or ratio.
    Float,
    /// UTF-8 text.
    Text,
    /// UTC timestamp.
    Time,
    /// Ordered list of strings.
    TextList,
    /// Ordered list of signed integers.
    IntList,
    /// Ordered list of flags.
    BoolList,
    /// Opaque byte payload.
    Bytes,
    /// Composite speed limit settings.
    SpeedLimit,
    /// Composite seed ratio limit.
    RatioLimit,
    /// Composite seed idle limit.
    IdleLimit,
}

impl ValueKind {
    /// Stable lowercase label used in logs and error context.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Text => "text",
            Self::Time => "time",
            Self::TextList => "text_list",
            Self::IntList => "int_list",
            Self::BoolList => "bool_list",
            Self::Bytes => "bytes",
            Self::SpeedLimit => "speed_limit",
            Self::RatioLimit => "ratio_limit",
            Self::IdleLimit => "idle_limit",
        }
    }
}

/// Whether a per-torrent limit follows the session default, its own value, or nothing.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitMode {
    /// Follow the session-wide setting.
    #[default]
    Global,
    /// Use the per-torrent value.
    Single,
    /// Never stop for this criterion.
    Unlimited,
}

/// Per-torrent transfer limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpeedLimit {
    /// Upload cap in KiB/s.
    pub up_kbps: u64,
    /// Whether the upload cap is enforced.
    pub up_limited: bool,
    /// Download cap in KiB/s.
    pub down_kbps: u64,
    /// Whether the download cap is enforced.
    pub down_limited: bool,
    /// Whether session-wide limits also apply.
    pub honors_session_limits: bool,
}

/// Share ratio at which seeding stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatioLimit {
    /// How the ratio is chosen.
    pub mode: LimitMode,
    /// Ratio used when `mode` is [`LimitMode::Single`].
    #[serde(with = "float_repr")]
    pub ratio: f64,
}

/// Idle time after which seeding stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdleLimit {
    /// How the idle limit is chosen.
    pub mode: LimitMode,
    /// Idle minutes used when `mode` is [`LimitMode::Single`].
    pub minutes: u32,
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Float(#[serde(with = "float_repr")] f64),
    /// UTF-8 text.
    Text(String),
    /// UTC timestamp.
    Time(DateTime<Utc>),
    /// Ordered list of strings.
    TextList(Vec<String>),
    /// Ordered list of signed integers.
    IntList(Vec<i64>),
    /// Ordered list of flags.
    BoolList(Vec<bool>),
    /// Opaque bytes.
    Bytes(Vec<u8>),
    /// Speed limit settings.
    SpeedLimit(SpeedLimit),
    /// Seed ratio limit.
    RatioLimit(RatioLimit),
    /// Seed idle limit.
    IdleLimit(IdleLimit),
}

impl FieldValue {
    /// Shape of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::UInt(_) => ValueKind::UInt,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
            Self::Time(_) => ValueKind::Time,
            Self::TextList(_) => ValueKind::TextList,
            Self::IntList(_) => ValueKind::IntList,
            Self::BoolList(_) => ValueKind::BoolList,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::SpeedLimit(_) => ValueKind::SpeedLimit,
            Self::RatioLimit(_) => ValueKind::RatioLimit,
            Self::IdleLimit(_) => ValueKind::IdleLimit,
        }
    }

    /// Exact comparison used for change detection.
    ///
    /// Floats compare by bit pattern so a `NaN` reported twice is not a change.
    #[must_use]
    pub fn is_identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float(left), Self::Float(right)) => left.to_bits() == right.to_bits(),
            (Self::RatioLimit(left), Self::RatioLimit(right)) => {
                left.mode == right.mode && left.ratio.to_bits() == right.ratio.to_bits()
            }
            _ => self == other,
        }
    }

    /// Borrow the flag, if this is a [`FieldValue::Bool`].
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Signed integer payload.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Unsigned integer payload.
    #[must_use]
    pub const fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(value) => Some(*value),
            _ => None,
        }
    }

    /// Floating point payload.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Text payload.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Timestamp payload.
    #[must_use]
    pub const fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time(value) => Some(*value),
            _ => None,
        }
    }

    /// String list payload.
    #[must_use]
    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            Self::TextList(values) => Some(values.as_slice()),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Time(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(values: Vec<String>) -> Self {
        Self::TextList(values)
    }
}

impl From<SpeedLimit> for FieldValue {
    fn from(value: SpeedLimit) -> Self {
        Self::SpeedLimit(value)
    }
}

impl From<RatioLimit> for FieldValue {
    fn from(value: RatioLimit) -> Self {
        Self::RatioLimit(value)
    }
}

impl From<IdleLimit> for FieldValue {
    fn from(value: IdleLimit) -> Self {
        Self::IdleLimit(value)
    }
}

/// JSON has no literal for non-finite numbers, so they travel as the strings
/// `"inf"`, `"-inf"` and `"nan"`.
mod float_repr {
    use serde::de::{Error, Unexpected};
    use serde::{Deserialize, Deserializer, Serializer};

    const INFINITY: &str = "inf";
    const NEG_INFINITY: &str = "-inf";
    const NAN: &str = "nan";

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Number(f64),
        Named(String),
    }

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub(super) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str(NAN)
        } else if value.is_sign_positive() {
            serializer.serialize_str(INFINITY)
        } else {
            serializer.serialize_str(NEG_INFINITY)
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Wire::deserialize(deserializer)? {
            Wire::Number(value) => Ok(value),
            Wire::Named(name) => match name.as_str() {
                INFINITY => Ok(f64::INFINITY),
                NEG_INFINITY => Ok(f64::NEG_INFINITY),
                NAN => Ok(f64::NAN),
                other => Err(D::Error::invalid_value(
                    Unexpected::Str(other),
                    &"a number, \"inf\", \"-inf\" or \"nan\"",
                )),
            },
        }
    }
}
