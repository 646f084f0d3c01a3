//! Strong type definitions for Caption Sync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A server-assigned event identifier.
///
/// Unique and increasing within a channel. Channel cursors are expressed in
/// the same type: a cursor is the highest `EventId` applied so far, with
/// [`EventId::ZERO`] meaning nothing has been applied yet.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl EventId {
    /// The cursor value of a channel that has applied nothing.
    pub const ZERO: Self = Self(0);

    /// Create from a raw integer.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw integer.
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Whether this is the zero sentinel.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EventId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<EventId> for u64 {
    fn from(id: EventId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_ordering() {
        assert!(EventId::new(7) > EventId::new(5));
        assert_eq!(EventId::new(3).max(EventId::ZERO), EventId::new(3));
    }

    #[test]
    fn test_event_id_serializes_as_integer() {
        let json = serde_json::to_string(&EventId::new(711)).unwrap();
        assert_eq!(json, "711");
        let back: EventId = serde_json::from_str("711").unwrap();
        assert_eq!(back, EventId::new(711));
    }

    #[test]
    fn test_event_id_debug() {
        assert_eq!(format!("{:?}", EventId::new(9)), "EventId(9)");
        assert!(EventId::ZERO.is_zero());
    }
}
