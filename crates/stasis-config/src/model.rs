//! Typed configuration model.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Settings for the resume store, checkpointing, change feed, and logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StasisConfig {
    /// Directory holding one resume snapshot per torrent.
    pub resume_dir: PathBuf,
    /// Debounce window between checkpoint passes, in milliseconds.
    pub checkpoint_interval_ms: u64,
    /// Interval between change-feed polls, in milliseconds.
    pub change_poll_interval_ms: u64,
    /// Refuse to add a torrent whose resume data exists but cannot be read.
    pub strict_resume_io: bool,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
    /// `json`, `pretty`, or `auto`.
    pub log_format: String,
}

impl Default for StasisConfig {
    fn default() -> Self {
        Self {
            resume_dir: PathBuf::from(defaults::RESUME_DIR),
            checkpoint_interval_ms: defaults::CHECKPOINT_INTERVAL_MS,
            change_poll_interval_ms: defaults::CHANGE_POLL_INTERVAL_MS,
            strict_resume_io: false,
            log_level: defaults::LOG_LEVEL.to_string(),
            log_format: defaults::LOG_FORMAT.to_string(),
        }
    }
}

impl StasisConfig {
    /// Checkpoint debounce window.
    #[must_use]
    pub const fn checkpoint_interval(&self) -> Duration {
        Duration::from_millis(self.checkpoint_interval_ms)
    }

    /// Change-feed poll interval.
    #[must_use]
    pub const fn change_poll_interval(&self) -> Duration {
        Duration::from_millis(self.change_poll_interval_ms)
    }
}
