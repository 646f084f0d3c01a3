//! Engine configuration.

use std::time::Duration;

use caption_sync_core::InterimStyle;
use caption_sync_transport::{classify_endpoint, PullSettings, ReconnectPolicy, TransportMode};
use url::Url;

use crate::error::{Result, SyncError};

/// Default endpoint of the local transcript backend.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:57000/";

/// Default HTTP method for pull requests.
pub const DEFAULT_METHOD: &str = "POST";

/// Default staleness threshold.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_millis(40_000);

/// Where and how to reach the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportSettings {
    /// `ws://`/`wss://` selects push, `http://`/`https://` selects pull.
    pub endpoint: String,
    /// HTTP method of pull requests.
    pub method: String,
    /// Per-request timeout for pull requests.
    pub request_timeout: Option<Duration>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            method: DEFAULT_METHOD.to_string(),
            request_timeout: None,
        }
    }
}

/// Configuration of a [`crate::SyncEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub transport: TransportSettings,
    pub pull: PullSettings,
    pub reconnect: ReconnectPolicy,
    /// A target goes stale after this long without a render.
    pub stale_after: Duration,
    pub interim_style: InterimStyle,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transport: TransportSettings::default(),
            pull: PullSettings::default(),
            reconnect: ReconnectPolicy::default(),
            stale_after: DEFAULT_STALE_AFTER,
            interim_style: InterimStyle::default(),
        }
    }
}

impl EngineConfig {
    /// Set the endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.transport.endpoint = endpoint.into();
        self
    }

    /// Set the pull method.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.transport.method = method.into();
        self
    }

    /// Set the poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.pull.interval = interval;
        self
    }

    /// Set the backoff after a failed pull cycle.
    pub fn pull_error_backoff(mut self, backoff: Duration) -> Self {
        self.pull.error_backoff = backoff;
        self
    }

    /// Set the reconnect policy.
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Set the staleness threshold.
    pub fn stale_after(mut self, threshold: Duration) -> Self {
        self.stale_after = threshold;
        self
    }

    /// Set the interim wrapping.
    pub fn interim_style(mut self, style: InterimStyle) -> Self {
        self.interim_style = style;
        self
    }

    /// Classify the endpoint.
    pub fn mode(&self) -> Result<(TransportMode, Url)> {
        classify_endpoint(&self.transport.endpoint)
            .map_err(|e| SyncError::Configuration(e.to_string()))
    }

    /// Check every setting.
    pub fn validate(&self) -> Result<()> {
        self.mode()?;

        let method = self.transport.method.trim();
        if method.is_empty() || !method.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(SyncError::Configuration(format!(
                "invalid method `{}`",
                self.transport.method
            )));
        }
        if self.pull.interval.is_zero() {
            return Err(SyncError::Configuration(
                "poll interval must be positive".into(),
            ));
        }
        if self.pull.error_backoff < self.pull.interval {
            return Err(SyncError::Configuration(
                "pull error backoff must not be shorter than the poll interval".into(),
            ));
        }
        if self.stale_after.is_zero() {
            return Err(SyncError::Configuration(
                "staleness threshold must be positive".into(),
            ));
        }
        if !(self.reconnect.decay.is_finite() && self.reconnect.decay >= 1.0) {
            return Err(SyncError::Configuration(
                "reconnect decay must be a finite factor >= 1.0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mode().unwrap().0, TransportMode::Push);
        assert_eq!(config.pull.interval, Duration::from_millis(100));
        assert_eq!(config.reconnect.interval, Duration::from_millis(2000));
        assert_eq!(config.reconnect.max_attempts, 10);
        assert_eq!(config.stale_after, Duration::from_secs(40));
        assert_eq!(config.transport.method, "POST");
    }

    #[test]
    fn test_http_endpoint_selects_pull() {
        let config = EngineConfig::default().endpoint("http://127.0.0.1:57000/output");
        assert_eq!(config.mode().unwrap().0, TransportMode::Pull);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let bad = [
            EngineConfig::default().endpoint("ftp://x/"),
            EngineConfig::default().method(""),
            EngineConfig::default().method("PO ST"),
            EngineConfig::default().poll_interval(Duration::ZERO),
            EngineConfig::default().pull_error_backoff(Duration::from_millis(50)),
            EngineConfig::default().stale_after(Duration::ZERO),
            EngineConfig::default().reconnect(ReconnectPolicy {
                decay: 0.5,
                ..ReconnectPolicy::default()
            }),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(SyncError::Configuration(_))),
                "{config:?}"
            );
        }
    }
}
