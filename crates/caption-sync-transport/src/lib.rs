//! # Caption Sync Transport
//!
//! Transport adapters that feed update events into a synchronization engine.
//!
//! ## Overview
//!
//! Two interchangeable adapters implement the [`Transport`] trait:
//!
//! - [`PushAdapter`] keeps a persistent connection open, decodes every inbound
//!   message as a single datum or an ordered batch, and reconnects with a
//!   bounded retry budget.
//! - [`PullAdapter`] issues one batched request per cycle asking for the newest
//!   unseen datum of every channel, and backs off after a failed cycle.
//!
//! Both hand [`caption_sync_core::RawDatum`]s to an [`EventSink`] and never
//! apply anything themselves. The network side sits behind the
//! [`PushConnector`] and [`PullClient`] traits, with WebSocket
//! ([`WebSocketConnector`]) and HTTP ([`HttpPullClient`]) implementations plus
//! in-memory ones in `memory` for tests, built only with the `test-util`
//! feature.
//!
//! ## Push State Machine
//!
//! ```text
//!                connect ok
//! Connecting ─────────────────► Open
//!   ▲    │                      │  │
//!   │    │ connect err   frame  │  │ peer close
//!   │    │               error  │  │
//!   │    ▼                      ▼  ▼
//!   │   Erroring ◄──────────────┘  Closed
//!   │      │                         │
//!   │      └───────────┬─────────────┘
//!   │                  │ retry_count += 1
//!   │   retry_count    │
//!   └──── <= budget ───┤
//!       (after delay)  │ retry_count > budget
//!                      ▼
//!                    Failed (terminal)
//! ```

pub mod endpoint;
pub mod error;
pub mod handlers;
pub mod http;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod pull;
pub mod push;
pub mod traits;
pub mod websocket;

pub use endpoint::{classify_endpoint, TransportMode};
pub use error::{Result, TransportError};
pub use handlers::PushHandlers;
pub use http::HttpPullClient;
#[cfg(any(test, feature = "test-util"))]
pub use memory::{
    ChannelConnector, ConnectStep, MemoryBackend, PushFeed, ScriptedConnector, ScriptedPullClient,
};
pub use pull::{PullAdapter, PullSettings};
pub use push::{PushAdapter, PushState, ReconnectPolicy, Submitter};
pub use traits::{EventSink, PullClient, PushConnection, PushConnector, SessionEvent, Transport};
pub use websocket::WebSocketConnector;
