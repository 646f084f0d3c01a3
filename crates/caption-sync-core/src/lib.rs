//! # Caption Sync Core
//!
//! Pure primitives for Caption Sync: update events, cursors, and the JSON
//! wire shapes exchanged with the transcript backend.
//!
//! This crate contains no I/O, no timers, no networking. It is pure
//! computation over the event model.
//!
//! ## Key Types
//!
//! - [`UpdateEvent`] - A validated transcript update for one channel
//! - [`EventId`] - Server-assigned, per-channel increasing identifier
//! - [`WireDatum`] - The loosely-typed datum as it appears on the wire
//! - [`RawDatum`] - An inbound datum as untyped JSON, typed one at a time
//! - [`PushMessage`] - A pushed message: a single datum or an ordered batch
//! - [`PullRequest`] / [`PullResponse`] - The periodic pull exchange
//! - [`RenderFrame`] - What a display target is asked to show
//!
//! ## Validation
//!
//! Wire data is converted into [`UpdateEvent`] through [`validate_datum`]
//! (or [`validate_raw`] for inbound JSON). A datum that is missing a
//! required field, or carries one of the wrong type, yields a [`MalformedEvent`]
//! which callers log and drop; it never halts a stream.

pub mod error;
pub mod event;
pub mod render;
pub mod types;
pub mod validation;
pub mod wire;

pub use error::{CoreError, MalformedEvent, Result};
pub use event::{UpdateEvent, FLAG_IS_FINAL};
pub use render::{InterimStyle, RenderFrame};
pub use types::EventId;
pub use validation::{validate_datum, validate_raw};
pub use wire::{ChannelRequest, PullRequest, PullResponse, PushMessage, RawDatum, WireDatum};
