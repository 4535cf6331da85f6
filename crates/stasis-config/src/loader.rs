//! Layered configuration loading.
//!
//! # Design
//! - Defaults, then an optional JSON file, then `STASIS_*` variables, then validation.
//! - The environment is captured as a map so tests never touch process state.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::StasisConfig;
use crate::validate::{parse_bool, parse_millis, validate};

/// Prefix shared by every configuration variable.
pub const ENV_PREFIX: &str = "STASIS_";
/// Variable naming the configuration file.
pub const CONFIG_PATH_VAR: &str = "STASIS_CONFIG";

/// Builds a [`StasisConfig`] from its sources.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    file: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl ConfigLoader {
    /// Loader with no file and no environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader reading `STASIS_*` variables from the process environment.
    ///
    /// The file named by `STASIS_CONFIG`, if set, is used unless
    /// [`ConfigLoader::with_file`] overrides it.
    #[must_use]
    pub fn from_process_env() -> Self {
        Self::new().with_env(std::env::vars())
    }

    /// Read the JSON document at `path` before applying the environment.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Use `vars` as the environment; entries without the prefix are ignored.
    #[must_use]
    pub fn with_env<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect();
        self
    }

    /// Resolve the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, a variable cannot
    /// be parsed, or the result fails validation.
    pub fn load(&self) -> ConfigResult<StasisConfig> {
        let file = self
            .file
            .clone()
            .or_else(|| self.env.get(CONFIG_PATH_VAR).map(PathBuf::from));
        let mut config = match &file {
            Some(path) => read_file(path)?,
            None => StasisConfig::default(),
        };
        self.apply_env(&mut config)?;
        validate(&config)?;
        debug!(
            file = file.as_ref().map(|path| path.display().to_string()),
            resume_dir = %config.resume_dir.display(),
            checkpoint_interval_ms = config.checkpoint_interval_ms,
            "configuration loaded"
        );
        Ok(config)
    }

    fn var(&self, name: &str) -> Option<&str> {
        self.env
            .get(&format!("{ENV_PREFIX}{name}"))
            .map(String::as_str)
    }

    fn apply_env(&self, config: &mut StasisConfig) -> ConfigResult<()> {
        if let Some(raw) = self.var("RESUME_DIR") {
            config.resume_dir = PathBuf::from(raw);
        }
        if let Some(raw) = self.var("CHECKPOINT_INTERVAL_MS") {
            config.checkpoint_interval_ms = parse_millis("checkpoint_interval_ms", raw)?;
        }
        if let Some(raw) = self.var("CHANGE_POLL_INTERVAL_MS") {
            config.change_poll_interval_ms = parse_millis("change_poll_interval_ms", raw)?;
        }
        if let Some(raw) = self.var("STRICT_RESUME_IO") {
            config.strict_resume_io = parse_bool("strict_resume_io", raw)?;
        }
        if let Some(raw) = self.var("LOG_LEVEL") {
            config.log_level = raw.trim().to_ascii_lowercase();
        }
        if let Some(raw) = self.var("LOG_FORMAT") {
            config.log_format = raw.trim().to_ascii_lowercase();
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> ConfigResult<StasisConfig> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        operation: "read_config",
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ConfigError::Io {
            operation: "read_config",
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, "configuration file is empty"),
        });
    }
    serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn no_sources_yields_defaults() -> Result<()> {
        assert_eq!(ConfigLoader::new().load()?, StasisConfig::default());
        Ok(())
    }

    #[test]
    fn environment_overrides_file() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("stasis.json");
        fs::write(
            &path,
            r#"{"resume_dir": "/var/lib/stasis", "checkpoint_interval_ms": 1000, "log_format": "json"}"#,
        )?;

        let config = ConfigLoader::new()
            .with_file(&path)
            .with_env([
                ("STASIS_CHECKPOINT_INTERVAL_MS", "250"),
                ("STASIS_STRICT_RESUME_IO", "true"),
                ("STASIS_LOG_LEVEL", "DEBUG"),
                ("HOME", "/root"),
            ])
            .load()?;

        assert_eq!(config.resume_dir, PathBuf::from("/var/lib/stasis"));
        assert_eq!(config.checkpoint_interval_ms, 250);
        assert!(config.strict_resume_io);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, "json");
        Ok(())
    }

    #[test]
    fn config_path_can_come_from_environment() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("from-env.json");
        fs::write(&path, r#"{"change_poll_interval_ms": 42}"#)?;
        let config = ConfigLoader::new()
            .with_env([(CONFIG_PATH_VAR.to_string(), path.display().to_string())])
            .load()?;
        assert_eq!(config.change_poll_interval_ms, 42);
        Ok(())
    }

    #[test]
    fn bad_sources_are_reported_with_context() -> Result<()> {
        let dir = TempDir::new()?;
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            ConfigLoader::new().with_file(&missing).load(),
            Err(ConfigError::Io {
                operation: "read_config",
                ..
            })
        ));

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{")?;
        assert!(matches!(
            ConfigLoader::new().with_file(&broken).load(),
            Err(ConfigError::Parse { .. })
        ));

        assert!(matches!(
            ConfigLoader::new()
                .with_env([("STASIS_CHECKPOINT_INTERVAL_MS", "soon")])
                .load(),
            Err(ConfigError::InvalidField {
                field: "checkpoint_interval_ms",
                reason: "not_an_integer",
                ..
            })
        ));
        Ok(())
    }
}
