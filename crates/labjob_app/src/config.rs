use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use labjob_logging::{job_info, LogDestination, DEFAULT_LOG_FILE};
use labjob_transport::{TransportSettings, Url};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "labjob.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid base url {url:?}: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unknown log level {0:?}")]
    LogLevel(String),
}

/// Client settings, stored as RON:
///
/// ```ron
/// (
///     base_url: "http://localhost:5000",
///     cancel_grace_ms: 5000,
///     log_destination: Both,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    /// How long to wait for a terminal event after the backend acknowledged a cancel.
    pub cancel_grace_ms: u64,
    pub log_destination: LogDestination,
    pub log_level: String,
    pub log_file: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            cancel_grace_ms: 5_000,
            log_destination: LogDestination::default(),
            log_level: "info".to_string(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl ClientConfig {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] when `path` is `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file is an error.
    /// The values are not validated here.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound && !explicit => {
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        let config = ron::from_str(&text).map_err(|err| ConfigError::Parse {
            path: path.clone(),
            message: err.to_string(),
        })?;
        job_info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Parse only; values are checked by [`ClientConfig::validate`] once
    /// command-line overrides have been applied.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        ron::from_str(text).map_err(|err| ConfigError::Parse {
            path: PathBuf::new(),
            message: err.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_base_url()?;
        self.level_filter()?;
        Ok(())
    }

    pub fn transport_settings(&self) -> Result<TransportSettings, ConfigError> {
        let mut settings = TransportSettings::new(self.parsed_base_url()?);
        settings.connect_timeout = Duration::from_millis(self.connect_timeout_ms);
        settings.request_timeout = Duration::from_millis(self.request_timeout_ms);
        Ok(settings)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }

    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        labjob_logging::parse_level(&self.log_level)
            .ok_or_else(|| ConfigError::LogLevel(self.log_level.clone()))
    }

    fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.base_url).map_err(|source| ConfigError::BaseUrl {
            url: self.base_url.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_fields_take_defaults() {
        let config = ClientConfig::from_ron(r#"(log_level: "info")"#).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn bad_level_is_rejected_on_validate() {
        let config = ClientConfig::from_ron(r#"(log_level: "chatty")"#).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::LogLevel(level) if level == "chatty"));
    }
}
