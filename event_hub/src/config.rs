//! Hub configuration, loaded from an optional TOML file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use game_events::StatsEngine;

use crate::ledger::LEDGER_CAPACITY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration. Every section and field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HubConfig {
    pub server: ServerConfig,
    pub ledger: LedgerConfig,
    pub stats: StatsConfig,
    pub reconciler: ReconcilerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9002".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            capacity: LEDGER_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StatsConfig {
    /// Skip events flagged as ignored when computing stats.
    pub exclude_ignored: bool,
}

impl StatsConfig {
    pub fn engine(&self) -> StatsEngine {
        StatsEngine::new().with_exclude_ignored(self.exclude_ignored)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Base URL of the hub the client view polls.
    pub base_url: String,
    pub interval_ms: u64,
}

impl ReconcilerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9002".to_string(),
            interval_ms: 3000,
        }
    }
}

impl HubConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HubConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1:9002");
        assert_eq!(config.ledger.capacity, 100);
        assert!(!config.stats.exclude_ignored);
        assert_eq!(config.reconciler.interval(), Duration::from_secs(3));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = HubConfig::from_toml_str(
            r#"
            [server]
            bind = "0.0.0.0:8080"

            [stats]
            exclude_ignored = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert!(config.stats.exclude_ignored);
        assert!(config.stats.engine().excludes_ignored());
        assert_eq!(config.ledger.capacity, 100);
        assert_eq!(config.reconciler.interval_ms, 3000);
    }

    #[test]
    fn test_empty_file() {
        assert_eq!(HubConfig::from_toml_str("").unwrap(), HubConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let err = HubConfig::from_toml_str("[ledger]\ncapacity = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = HubConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
