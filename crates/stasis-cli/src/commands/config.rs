//! `stasis config`.

use stasis_config::StasisConfig;

use crate::cli::OutputFormat;
use crate::error::CliResult;
use crate::output::to_json;

pub(crate) fn render(config: &StasisConfig, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(config),
        OutputFormat::Table => Ok([
            format!("resume_dir: {}", config.resume_dir.display()),
            format!("checkpoint_interval_ms: {}", config.checkpoint_interval_ms),
            format!("change_poll_interval_ms: {}", config.change_poll_interval_ms),
            format!("strict_resume_io: {}", config.strict_resume_io),
            format!("log_level: {}", config.log_level),
            format!("log_format: {}", config.log_format),
        ]
        .join("\n")),
    }
}
