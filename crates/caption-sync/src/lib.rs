//! # Caption Sync
//!
//! Renders live, incrementally updated transcript text from a buffering
//! backend onto named display surfaces.
//!
//! ## Overview
//!
//! - **Channels**: named streams of text updates (one speaker, one input source)
//! - **Cursors**: per-channel high-water marks that make duplicate and
//!   out-of-order delivery harmless
//! - **Interim vs final**: interim text is provisional and wrapped in a marker,
//!   final text is shown verbatim and persisted
//! - **Staleness**: a target that sees no update for a threshold is marked stale
//! - **Transports**: a persistent WebSocket push connection or an HTTP pull loop,
//!   chosen by the endpoint scheme
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use caption_sync::{EngineConfig, SyncEngine, TerminalTarget};
//!
//! async fn example() -> caption_sync::Result<()> {
//!     let config = EngineConfig::default().endpoint("http://127.0.0.1:57000/output");
//!     let mut engine = SyncEngine::new(config)?;
//!
//!     let terminal = Arc::new(TerminalTarget::stdout());
//!     engine.register("user", &terminal);
//!     engine.register("ai", &terminal);
//!
//!     engine.run()?;
//!     tokio::signal::ctrl_c().await.ok();
//!     engine.shutdown().await
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `caption_sync::core`: events, wire payloads, validation, render frames
//! - `caption_sync::transport`: push and pull adapters
//! - `caption_sync::engine`: registry, staleness tracker, engine

pub mod config;
pub mod logging;
pub mod terminal;

pub use caption_sync_core as core;
pub use caption_sync_engine as engine;
pub use caption_sync_transport as transport;

pub use config::{OutputConfig, OutputError};
pub use terminal::TerminalTarget;

pub use caption_sync_core::{EventId, InterimStyle, RenderFrame, UpdateEvent};
pub use caption_sync_engine::{
    ApplyOutcome, DisplayTarget, EngineConfig, OutboundDatum, Result, SessionStatus, SyncEngine,
    SyncError, SyncStats, TargetDiscovery, TargetId,
};
pub use caption_sync_transport::{PushState, ReconnectPolicy, TransportError, TransportMode};
