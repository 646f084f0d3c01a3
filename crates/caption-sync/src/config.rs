//! File configuration for the output client.
//!
//! A JSON document, every field optional:
//!
//! ```json
//! {
//!   "endpoint": "http://127.0.0.1:57000/output",
//!   "method": "POST",
//!   "channels": ["user", "ai"],
//!   "poll_interval_ms": 100,
//!   "stale_after_ms": 40000
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use caption_sync_engine::{EngineConfig, SyncError, TransportSettings, DEFAULT_ENDPOINT, DEFAULT_METHOD};
use caption_sync_transport::{PullSettings, ReconnectPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading or converting an [`OutputConfig`].
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(#[from] SyncError),
}

/// Output client settings as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub endpoint: String,
    pub method: String,
    pub channels: Vec<String>,
    pub poll_interval_ms: u64,
    pub pull_error_backoff_ms: u64,
    pub request_timeout_ms: Option<u64>,
    pub reconnect_interval_ms: u64,
    pub reconnect_max: u32,
    pub reconnect_decay: f64,
    pub reconnect_max_interval_ms: u64,
    pub stale_after_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let pull = PullSettings::default();
        let reconnect = ReconnectPolicy::default();
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            method: DEFAULT_METHOD.to_string(),
            channels: Vec::new(),
            poll_interval_ms: pull.interval.as_millis() as u64,
            pull_error_backoff_ms: pull.error_backoff.as_millis() as u64,
            request_timeout_ms: None,
            reconnect_interval_ms: reconnect.interval.as_millis() as u64,
            reconnect_max: reconnect.max_attempts,
            reconnect_decay: reconnect.decay,
            reconnect_max_interval_ms: reconnect.max_interval.as_millis() as u64,
            stale_after_ms: 40_000,
        }
    }
}

impl OutputConfig {
    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OutputError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| OutputError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| OutputError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parse a JSON document.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Convert to a validated engine configuration.
    pub fn to_engine_config(&self) -> Result<EngineConfig, OutputError> {
        let config = EngineConfig {
            transport: TransportSettings {
                endpoint: self.endpoint.clone(),
                method: self.method.clone(),
                request_timeout: self.request_timeout_ms.map(Duration::from_millis),
            },
            pull: PullSettings {
                interval: Duration::from_millis(self.poll_interval_ms),
                error_backoff: Duration::from_millis(self.pull_error_backoff_ms),
            },
            reconnect: ReconnectPolicy {
                interval: Duration::from_millis(self.reconnect_interval_ms),
                max_attempts: self.reconnect_max,
                decay: self.reconnect_decay,
                max_interval: Duration::from_millis(self.reconnect_max_interval_ms),
            },
            stale_after: Duration::from_millis(self.stale_after_ms),
            ..EngineConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = OutputConfig::from_json("{}").unwrap();
        assert_eq!(config, OutputConfig::default());

        let engine = config.to_engine_config().unwrap();
        assert_eq!(engine, EngineConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = OutputConfig::from_json(
            r#"{"endpoint":"http://127.0.0.1:57000/output","channels":["user","ai"],"poll_interval_ms":250}"#,
        )
        .unwrap();

        assert_eq!(config.channels, vec!["user", "ai"]);
        let engine = config.to_engine_config().unwrap();
        assert_eq!(engine.pull.interval, Duration::from_millis(250));
        assert_eq!(engine.stale_after, Duration::from_secs(40));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = OutputConfig {
            poll_interval_ms: 0,
            ..OutputConfig::default()
        };
        assert!(matches!(
            config.to_engine_config(),
            Err(OutputError::Invalid(SyncError::Configuration(_)))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"method":"GET","stale_after_ms":5000}}"#).unwrap();

        let config = OutputConfig::load(file.path()).unwrap();
        assert_eq!(config.method, "GET");
        assert_eq!(config.stale_after_ms, 5000);
    }

    #[test]
    fn test_load_errors_name_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();

        let error = OutputConfig::load(file.path()).unwrap_err();
        assert!(matches!(error, OutputError::Parse { .. }));
        assert!(error.to_string().contains(&file.path().display().to_string()));

        let missing = OutputConfig::load("/nonexistent/caption-sync.json").unwrap_err();
        assert!(matches!(missing, OutputError::Read { .. }));
    }
}
