//! Store configuration.
//!
//! # Responsibility
//! - Describe where the relational store lives and how connections behave.
//! - Carry optional logging bootstrap settings for host binaries.
//!
//! # Invariants
//! - Missing `db_path` means an in-memory store.
//! - Unknown JSON keys are rejected so typos surface at startup.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Connection and logging settings for one store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// SQLite database file. `None` selects an in-memory database.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// How long a writer waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// One of `trace|debug|info|warn|error`.
    #[serde(default)]
    pub log_level: Option<String>,
    /// Absolute directory for rolling log files.
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            log_level: None,
            log_dir: None,
        }
    }
}

impl StoreConfig {
    /// Config for a file-backed store with default settings.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(ConfigError::Parse)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid store config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StoreConfig;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn empty_document_uses_defaults() {
        let config = StoreConfig::from_json_str("{}").expect("empty object should parse");
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn parses_all_fields() {
        let config = StoreConfig::from_json_str(
            r#"{
                "db_path": "/var/lib/shopcart/store.db",
                "busy_timeout_ms": 250,
                "log_level": "debug",
                "log_dir": "/var/log/shopcart"
            }"#,
        )
        .expect("full config should parse");
        assert_eq!(
            config.db_path,
            Some(PathBuf::from("/var/lib/shopcart/store.db"))
        );
        assert_eq!(config.busy_timeout(), Duration::from_millis(250));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.log_dir.as_deref(), Some("/var/log/shopcart"));
    }

    #[test]
    fn rejects_unknown_keys() {
        let error = StoreConfig::from_json_str(r#"{"db_pth": "x.db"}"#)
            .expect_err("typo keys must be rejected");
        assert!(error.to_string().contains("db_pth"));
    }
}
