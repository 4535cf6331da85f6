//! Validation helpers and parsing utilities for configuration values.

use crate::defaults::{MAX_INTERVAL_MS, MIN_INTERVAL_MS};
use crate::error::{ConfigError, ConfigResult};
use crate::model::StasisConfig;

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];
const LOG_FORMATS: [&str; 3] = ["auto", "json", "pretty"];

/// Check every field of `config`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for the first field that fails.
pub fn validate(config: &StasisConfig) -> ConfigResult<()> {
    if config.resume_dir.as_os_str().is_empty() {
        return Err(ConfigError::InvalidField {
            field: "resume_dir",
            value: None,
            reason: "empty",
        });
    }
    validate_interval("checkpoint_interval_ms", config.checkpoint_interval_ms)?;
    validate_interval("change_poll_interval_ms", config.change_poll_interval_ms)?;
    if !LOG_LEVELS.contains(&config.log_level.as_str()) {
        return Err(ConfigError::invalid(
            "log_level",
            &config.log_level,
            "unknown_level",
        ));
    }
    if !LOG_FORMATS.contains(&config.log_format.as_str()) {
        return Err(ConfigError::invalid(
            "log_format",
            &config.log_format,
            "unknown_format",
        ));
    }
    Ok(())
}

fn validate_interval(field: &'static str, value: u64) -> ConfigResult<()> {
    if (MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, value.to_string(), "out_of_range"))
    }
}

pub(crate) fn parse_bool(field: &'static str, raw: &str) -> ConfigResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(field, raw, "not_a_bool")),
    }
}

pub(crate) fn parse_millis(field: &'static str, raw: &str) -> ConfigResult<u64> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, raw, "not_an_integer"))
}
