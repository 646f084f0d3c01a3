//! Error types for the transport module.

use caption_sync_core::CoreError;
use thiserror::Error;

/// Errors that can occur while moving data between backend and engine.
///
/// Everything except [`TransportError::Exhausted`] is transient: the
/// adapters log it and recover on their own.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not establish a push connection.
    #[error("connect failed: {0}")]
    Connect(String),

    /// An established connection failed while reading.
    #[error("connection error: {0}")]
    Connection(String),

    /// A pull request failed before a response arrived.
    #[error("request failed: {0}")]
    Request(String),

    /// The backend answered a pull request with a non-success status.
    #[error("unexpected status: {0}")]
    Status(u16),

    /// A payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] CoreError),

    /// Sending on the push connection failed.
    #[error("send failed: {0}")]
    Send(String),

    /// The endpoint cannot be used by any transport.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The configured HTTP method is not a valid method token.
    #[error("invalid method: {0}")]
    InvalidMethod(String),

    /// The push reconnect budget is spent. Terminal.
    #[error("reconnect budget exhausted after {attempts} consecutive failures")]
    Exhausted { attempts: u32 },
}

impl TransportError {
    /// Whether this error ends the session instead of being retried.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransportError::Exhausted { .. })
    }
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
