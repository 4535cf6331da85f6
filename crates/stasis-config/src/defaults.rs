//! Default values for configuration fields.
//!
//! # Design
//! - Keep every default in one place so serde, docs, and tests agree.

/// Directory holding resume snapshots, relative to the working directory.
pub(crate) const RESUME_DIR: &str = "resume";
/// Debounce window between checkpoint passes.
pub(crate) const CHECKPOINT_INTERVAL_MS: u64 = 5_000;
/// Interval between change-feed polls.
pub(crate) const CHANGE_POLL_INTERVAL_MS: u64 = 500;
/// Default log level when `RUST_LOG` is unset.
pub(crate) const LOG_LEVEL: &str = "info";
/// Default log format name; resolved per build profile.
pub(crate) const LOG_FORMAT: &str = "auto";

/// Lower bound for both intervals.
pub(crate) const MIN_INTERVAL_MS: u64 = 10;
/// Upper bound for both intervals (one hour).
pub(crate) const MAX_INTERVAL_MS: u64 = 3_600_000;
