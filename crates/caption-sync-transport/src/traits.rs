//! Transport abstraction.
//!
//! The adapters are written against these traits so the same retry and
//! polling logic runs over real sockets and over in-memory doubles.

use std::time::Duration;

use async_trait::async_trait;
use caption_sync_core::{EventId, PullRequest, PullResponse, RawDatum};
use tokio_util::sync::CancellationToken;

use crate::endpoint::TransportMode;
use crate::error::Result;
use crate::push::{PushState, Submitter};

/// Lifecycle notifications an adapter reports to its sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The push state machine moved.
    PushState { state: PushState, retry_count: u32 },
    /// A reconnect is scheduled after `delay`.
    Reconnecting { attempt: u32, delay: Duration },
    /// A pull cycle failed, or a pushed payload could not be decoded.
    TransportFailed,
}

/// Receiving side of a transport: the synchronization engine.
///
/// Implementations must be thread-safe (Send + Sync).
pub trait EventSink: Send + Sync {
    /// Whether the session is still running.
    ///
    /// Adapters check this before each delivery and stop forwarding once it
    /// turns false.
    fn is_running(&self) -> bool;

    /// Every registered channel with its current cursor.
    fn cursors(&self) -> Vec<(String, EventId)>;

    /// Hand one datum to the engine. Typing and validation happen on the
    /// engine side, one datum at a time.
    fn deliver(&self, datum: RawDatum);

    /// Observe a lifecycle change.
    fn on_session_event(&self, _event: SessionEvent) {}
}

/// A running transport adapter.
#[async_trait]
pub trait Transport: Send {
    /// Which mode this adapter implements.
    fn mode(&self) -> TransportMode;

    /// Drive the transport until `cancel` fires or a terminal error occurs.
    ///
    /// Returns `Ok(())` on cancellation. Transient errors are handled inside.
    async fn run(&mut self, sink: &dyn EventSink, cancel: CancellationToken) -> Result<()>;

    /// Handle for outbound submissions, if the transport supports them.
    fn submitter(&self) -> Option<Submitter> {
        None
    }
}

/// Client side of the pull exchange.
#[async_trait]
pub trait PullClient: Send + Sync {
    /// Perform one batched request.
    async fn fetch(&self, request: &PullRequest) -> Result<PullResponse>;
}

/// Opens push connections.
#[async_trait]
pub trait PushConnector: Send + Sync {
    /// Establish a new connection.
    async fn connect(&self) -> Result<Box<dyn PushConnection>>;
}

/// An established push connection.
///
/// `recv` must be cancel-safe: the push adapter races it against outbound
/// submissions and cancellation.
#[async_trait]
pub trait PushConnection: Send {
    /// Next text frame. `Ok(None)` means the peer closed the connection.
    async fn recv(&mut self) -> Result<Option<String>>;

    /// Send a text frame.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Close the connection. Errors are not interesting at this point.
    async fn close(&mut self);
}
