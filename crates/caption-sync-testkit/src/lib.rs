//! # Caption Sync Testkit
//!
//! Testing utilities for Caption Sync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Wire vectors**: Known payloads with their expected decoded data
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: A recording display target and an engine wired to in-memory transports
//! - **Doubles**: The in-memory transports themselves, re-exported as [`doubles`]
//!
//! ## Wire Vectors
//!
//! ```rust
//! use caption_sync_core::PushMessage;
//! use caption_sync_testkit::vectors::push_vectors;
//!
//! for vector in push_vectors() {
//!     let message = PushMessage::decode(vector.json).unwrap();
//!     assert_eq!(message.len(), vector.expected.len());
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use caption_sync_testkit::generators::delivery;
//!
//! proptest! {
//!     #[test]
//!     fn cursor_ends_at_max(events in delivery("user", 20)) {
//!         // ...
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use caption_sync_testkit::fixtures::{EngineFixture, final_text};
//!
//! let fixture = EngineFixture::new(&["user"]);
//! fixture.engine.apply_event(&final_text("user", 3, "hello"));
//! assert_eq!(fixture.target("user").last_text().as_deref(), Some("hello"));
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use caption_sync_transport::memory as doubles;
pub use fixtures::{EngineFixture, RecordingTarget};
