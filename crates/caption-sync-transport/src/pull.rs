//! Pull adapter: fixed-rate request loop.

use std::time::Duration;

use async_trait::async_trait;
use caption_sync_core::PullRequest;
use tokio_util::sync::CancellationToken;

use crate::endpoint::TransportMode;
use crate::error::Result;
use crate::traits::{EventSink, PullClient, SessionEvent, Transport};

/// Cadence of the pull loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullSettings {
    /// Pause between successful cycles.
    pub interval: Duration,
    /// Pause after a failed cycle. Longer than `interval`.
    pub error_backoff: Duration,
}

impl Default for PullSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            error_backoff: Duration::from_millis(2000),
        }
    }
}

/// Periodic-request transport.
///
/// Each cycle sends one batched request listing every registered channel
/// with its cursor and a count of 1, then forwards the newest item per
/// channel. A failed cycle is logged and followed by the error backoff; the
/// loop itself never gives up.
pub struct PullAdapter<P: PullClient> {
    client: P,
    settings: PullSettings,
    cycles: u64,
    failed_cycles: u64,
}

impl<P: PullClient> PullAdapter<P> {
    /// Create an adapter over `client`.
    pub fn new(client: P, settings: PullSettings) -> Self {
        Self {
            client,
            settings,
            cycles: 0,
            failed_cycles: 0,
        }
    }

    /// Cycles that issued a request.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Cycles that failed.
    pub fn failed_cycles(&self) -> u64 {
        self.failed_cycles
    }

    /// Run one cycle. Returns the pause before the next one.
    async fn cycle(&mut self, sink: &dyn EventSink) -> Duration {
        let cursors = sink.cursors();
        if cursors.is_empty() {
            return self.settings.interval;
        }

        let request = PullRequest::latest(cursors.iter().map(|(name, id)| (name.as_str(), *id)));
        self.cycles += 1;

        match self.client.fetch(&request).await {
            Ok(response) => {
                for channel in &request.channels {
                    if !sink.is_running() {
                        break;
                    }
                    if let Some(datum) = response.latest(&channel.name) {
                        sink.deliver(datum);
                    }
                }
                self.settings.interval
            }
            Err(e) => {
                self.failed_cycles += 1;
                tracing::warn!(
                    backoff_ms = self.settings.error_backoff.as_millis() as u64,
                    "pull cycle failed: {}",
                    e
                );
                sink.on_session_event(SessionEvent::TransportFailed);
                self.settings.error_backoff
            }
        }
    }
}

#[async_trait]
impl<P: PullClient> Transport for PullAdapter<P> {
    fn mode(&self) -> TransportMode {
        TransportMode::Pull
    }

    async fn run(&mut self, sink: &dyn EventSink, cancel: CancellationToken) -> Result<()> {
        tracing::info!(
            interval_ms = self.settings.interval.as_millis() as u64,
            "pull loop started"
        );

        while sink.is_running() {
            let pause = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                pause = self.cycle(sink) => pause,
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        tracing::info!(cycles = self.cycles, failed = self.failed_cycles, "pull loop stopped");
        Ok(())
    }
}
