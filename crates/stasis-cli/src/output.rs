//! Output renderers and formatting helpers for CLI commands.

use anyhow::anyhow;
use serde::Serialize;
use stasis_core::FieldValue;

use crate::error::{CliError, CliResult};

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

/// Compact rendering of a value without its type tag.
pub(crate) fn value_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(text) => text.clone(),
        FieldValue::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        other => serde_json::to_value(other)
            .ok()
            .and_then(|tagged| tagged.get("value").map(ToString::to_string))
            .unwrap_or_default(),
    }
}

pub(crate) fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}
