//! Update events: the unit of synchronization.

use serde::{Deserialize, Serialize};

use crate::types::EventId;
use crate::wire::WireDatum;

/// Flag token marking content the producer will not revise further.
pub const FLAG_IS_FINAL: &str = "is_final";

/// A validated transcript update for a single channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEvent {
    /// The channel this update belongs to.
    pub channel: String,
    /// Server-assigned id, increasing within the channel.
    pub id: EventId,
    /// Current best-effort transcript text.
    pub content: String,
    /// True once the producer will not revise this content.
    pub is_final: bool,
}

impl UpdateEvent {
    /// Create a final event.
    pub fn final_text(channel: impl Into<String>, id: u64, content: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            id: EventId::new(id),
            content: content.into(),
            is_final: true,
        }
    }

    /// Create an interim (provisional) event.
    pub fn interim(channel: impl Into<String>, id: u64, content: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            id: EventId::new(id),
            content: content.into(),
            is_final: false,
        }
    }

    /// Convert back into the wire shape.
    pub fn to_wire(&self) -> WireDatum {
        let flags = if self.is_final {
            vec![FLAG_IS_FINAL.to_string()]
        } else {
            Vec::new()
        };
        WireDatum {
            channel: Some(self.channel.clone()),
            content: Some(self.content.clone()),
            id: Some(self.id.get()),
            flags: Some(flags),
            datetime: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_wire_marks_final() {
        let wire = UpdateEvent::final_text("user", 3, "hello").to_wire();
        assert!(wire.has_flag(FLAG_IS_FINAL));
        assert_eq!(wire.id, Some(3));

        let wire = UpdateEvent::interim("user", 4, "hel").to_wire();
        assert!(!wire.has_flag(FLAG_IS_FINAL));
    }
}
