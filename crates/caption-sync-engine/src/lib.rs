//! # Caption Sync Engine
//!
//! Keeps display targets consistent with per-channel, append-only backend
//! logs.
//!
//! ## Overview
//!
//! - [`ChannelRegistry`]: channels, their cursors, and the targets bound to them
//! - [`StalenessTracker`]: one expiry deadline per rendered target
//! - [`SyncEngine`]: registration, configuration, one transport session at a
//!   time, and the apply rule
//!
//! ## Apply Rule
//!
//! An event is applied iff its channel is registered and `id >= cursor`;
//! the cursor then becomes `max(cursor, id)`. Re-delivery of the newest id
//! renders the same frame again, so duplicates are invisible, and anything
//! older is dropped. This is what makes push and pull interchangeable.
//!
//! ```rust
//! use std::sync::Arc;
//! use caption_sync_core::{RenderFrame, UpdateEvent};
//! use caption_sync_engine::{DisplayTarget, SyncEngine};
//!
//! struct Print;
//!
//! impl DisplayTarget for Print {
//!     fn render(&self, frame: &RenderFrame) {
//!         println!("{}: {}", frame.channel, frame.text);
//!     }
//!     fn set_stale(&self, _stale: bool) {}
//! }
//!
//! let engine = SyncEngine::default();
//! let target = Arc::new(Print);
//! engine.register("user", &target);
//!
//! engine.apply_event(&UpdateEvent::final_text("user", 5, "later"));
//! engine.apply_event(&UpdateEvent::final_text("user", 3, "earlier"));
//! assert_eq!(engine.channel_cursor("user").unwrap().get(), 5);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod staleness;
pub mod status;
pub mod target;

pub use config::{EngineConfig, TransportSettings, DEFAULT_ENDPOINT, DEFAULT_METHOD, DEFAULT_STALE_AFTER};
pub use engine::{ApplyOutcome, OutboundDatum, SyncEngine};
pub use error::{Result, SyncError};
pub use registry::{Advance, Channel, ChannelRegistry, TargetState};
pub use staleness::StalenessTracker;
pub use status::{SessionStatus, SyncStats};
pub use target::{DisplayTarget, TargetDiscovery, TargetId};
