//! Error types for Caption Sync Core.

use thiserror::Error;

/// Errors that can occur while decoding wire payloads.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("push message carries neither channel_datum nor channel_data")]
    EmptyPushMessage,
}

/// A single datum failed required-field validation.
///
/// The datum is dropped; the stream it arrived on continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEvent {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("channel name is empty")]
    EmptyChannel,

    #[error("event id must be positive, got {0}")]
    InvalidId(u64),

    #[error("ill-typed datum: {0}")]
    IllTyped(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
