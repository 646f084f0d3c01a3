//! Error types for the synchronization engine.

use caption_sync_transport::TransportError;
use thiserror::Error;

/// Errors surfaced to the caller of [`crate::SyncEngine`].
///
/// Per-event and per-cycle failures never show up here; they are logged
/// and counted in [`crate::SyncStats`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid configuration, or configuration while a session is running.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// `run()` was called with nothing to synchronize.
    #[error("no channels registered and none discovered")]
    NoChannels,

    /// The push reconnect budget is spent.
    #[error("transport exhausted after {attempts} consecutive failures")]
    TransportExhausted { attempts: u32 },

    /// A transport error that reached the caller.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// A session is already running.
    #[error("a session is already running")]
    AlreadyRunning,

    /// The operation needs a running session.
    #[error("no session is running")]
    NotRunning,

    /// The driver task panicked or was aborted.
    #[error("driver task failed: {0}")]
    Task(String),
}

impl From<TransportError> for SyncError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Exhausted { attempts } => SyncError::TransportExhausted { attempts },
            other => SyncError::Transport(other),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;
