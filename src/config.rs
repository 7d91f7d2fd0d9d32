//! Client configuration

use crate::workflow::Timing;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cannot locate {0} directory")]
    NoDirectory(&'static str),
}

/// Settings shared by every command.
///
/// Every field is optional in the YAML file; missing keys take the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the analysis service
    pub backend_url: String,
    pub stage_interval_ms: u64,
    pub handoff_delay_ms: u64,
    /// Client-side timeout for the analysis call; unset waits indefinitely
    pub request_timeout_secs: Option<u64>,
    /// Continuity store location; unset uses the platform data directory
    pub store_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            stage_interval_ms: 1500,
            handoff_delay_ms: 2000,
            request_timeout_secs: None,
            store_path: None,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is
    /// an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Ok(p) => p,
                Err(_) => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_yaml(&contents).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
    }

    /// `<config_dir>/insight/config.yaml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoDirectory("config"))?;
        Ok(dir.join("insight").join("config.yaml"))
    }

    /// Configured store path, or `<data_dir>/insight/continuity.db`.
    pub fn resolved_store_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.store_path {
            return Ok(path.clone());
        }
        let dir = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local/share")))
            .ok_or(ConfigError::NoDirectory("data"))?;
        Ok(dir.join("insight").join("continuity.db"))
    }

    pub fn timing(&self) -> Timing {
        Timing {
            stage_interval: Duration::from_millis(self.stage_interval_ms),
            handoff_delay: Duration::from_millis(self.handoff_delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_narration_pacing() {
        let config = Config::default();
        assert_eq!(config.backend_url, "http://localhost:5000");
        assert_eq!(config.timing(), Timing::default());
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = "backend_url: http://analysis:8080\nrequest_timeout_secs: 90\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.backend_url, "http://analysis:8080");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.stage_interval_ms, 1500);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.yaml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "stage_interval_ms: [not, a, number]\n").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn explicit_store_path_wins() {
        let config = Config {
            store_path: Some(PathBuf::from("/tmp/insight.db")),
            ..Config::default()
        };
        assert_eq!(
            config.resolved_store_path().unwrap(),
            PathBuf::from("/tmp/insight.db")
        );
    }
}
