//! Error type carrying the process exit code.

use std::fmt::{self, Display, Formatter};

/// Failure of a CLI command.
#[derive(Debug)]
pub(crate) enum CliError {
    /// The invocation itself was wrong; exit code 2.
    Validation(String),
    /// The command ran and failed; exit code 3.
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    #[test]
    fn exit_codes_split_usage_from_failures() {
        assert_eq!(CliError::validation("bad id").exit_code(), 2);
        assert_eq!(CliError::failure(anyhow!("disk gone")).exit_code(), 3);
    }

    #[test]
    fn failure_messages_include_context() {
        let err: anyhow::Result<()> = Err(anyhow!("permission denied")).context("reading snapshot");
        let message = err
            .map_err(CliError::failure)
            .err()
            .map(|err| err.display_message());
        assert_eq!(
            message.as_deref(),
            Some("reading snapshot: permission denied")
        );
    }
}
