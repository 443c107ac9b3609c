//! Configuration file loading.
//!
//! The server is driven entirely by a small TOML file:
//!
//! ```toml
//! port = 1080
//! buffer_size = 8192
//! log_level = "info"
//! ```
//!
//! Every key is optional; a missing key falls back to its documented
//! default, and unrecognized keys are silently ignored (`serde`'s
//! default behavior for a struct without `deny_unknown_fields`).

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_PORT: u16 = 1080;
const DEFAULT_BUFFER_SIZE: usize = 8192;

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            buffer_size: default_buffer_size(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid log_level {0:?}: expected one of trace/debug/info/warn/error/critical/off")]
    InvalidLogLevel(String),
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        config.log_filter()?;

        Ok(config)
    }

    /// Validates and resolves `log_level` into a `tracing` filter.
    ///
    /// `critical` (one step above `tracing`'s own `ERROR`) is still
    /// surfaced at `ERROR` — the distinction lives in which macro the
    /// call site uses, not in the filter — and `off` disables logging
    /// entirely via [`LevelFilter::OFF`].
    pub fn log_filter(&self) -> Result<LevelFilter, ConfigError> {
        match self.log_level.as_str() {
            "trace" => Ok(LevelFilter::TRACE),
            "debug" => Ok(LevelFilter::DEBUG),
            "info" => Ok(LevelFilter::INFO),
            "warn" => Ok(LevelFilter::WARN),
            "error" | "critical" => Ok(LevelFilter::ERROR),
            "off" => Ok(LevelFilter::OFF),
            other => Err(ConfigError::InvalidLogLevel(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_keys() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config: Config = toml::from_str("port = 1081\nnonsense = true\n").unwrap();
        assert_eq!(config.port, 1081);
    }

    #[test]
    fn rejects_invalid_log_level() {
        let config = Config {
            log_level: "verbose".to_owned(),
            ..Config::default()
        };
        assert!(config.log_filter().is_err());
    }
}
