//! Endpoint classification: the URL scheme picks the transport.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TransportError};

/// Which adapter serves an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Persistent connection; the backend pushes updates.
    Push,
    /// Periodic request loop.
    Pull,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Push => write!(f, "push"),
            TransportMode::Pull => write!(f, "pull"),
        }
    }
}

/// Parse an endpoint and decide which transport serves it.
///
/// `ws://` and `wss://` select push; `http://` and `https://` select pull.
/// Anything else is rejected.
pub fn classify_endpoint(endpoint: &str) -> Result<(TransportMode, Url)> {
    let url = Url::parse(endpoint)
        .map_err(|e| TransportError::InvalidEndpoint(format!("{endpoint}: {e}")))?;

    let mode = match url.scheme() {
        "ws" | "wss" => TransportMode::Push,
        "http" | "https" => TransportMode::Pull,
        other => {
            return Err(TransportError::InvalidEndpoint(format!(
                "{endpoint}: unsupported scheme `{other}`"
            )))
        }
    };

    Ok((mode, url))
}
