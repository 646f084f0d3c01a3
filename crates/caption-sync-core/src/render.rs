//! Render frames: what a display target is asked to show.
//!
//! Final content is shown verbatim. Interim content is wrapped in a
//! provisional marker so a viewer can tell it may still change.

use serde::{Deserialize, Serialize};

use crate::event::UpdateEvent;
use crate::types::EventId;

/// Marker wrapped around interim content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterimStyle {
    pub prefix: String,
    pub suffix: String,
}

impl Default for InterimStyle {
    fn default() -> Self {
        Self {
            prefix: "（…".to_string(),
            suffix: "…💭）".to_string(),
        }
    }
}

impl InterimStyle {
    /// Create a style with a custom marker.
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Wrap interim text.
    pub fn wrap(&self, content: &str) -> String {
        let mut text = String::with_capacity(self.prefix.len() + content.len() + self.suffix.len());
        text.push_str(&self.prefix);
        text.push_str(content);
        text.push_str(&self.suffix);
        text
    }

    /// Produce the frame for an event.
    pub fn frame(&self, event: &UpdateEvent) -> RenderFrame {
        let text = if event.is_final {
            event.content.clone()
        } else {
            self.wrap(&event.content)
        };
        RenderFrame {
            channel: event.channel.clone(),
            id: event.id,
            text,
            is_final: event.is_final,
        }
    }
}

/// A single render instruction for a display target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFrame {
    /// Channel the content came from.
    pub channel: String,
    /// Id of the event being rendered.
    pub id: EventId,
    /// Text to display (already wrapped when interim).
    pub text: String,
    /// Whether the target should mark its content as persisted.
    pub is_final: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_is_verbatim() {
        let frame = InterimStyle::default().frame(&UpdateEvent::final_text("user", 1, "hello"));
        assert_eq!(frame.text, "hello");
        assert!(frame.is_final);
    }

    #[test]
    fn test_interim_is_wrapped() {
        let frame = InterimStyle::default().frame(&UpdateEvent::interim("user", 1, "hel"));
        assert_eq!(frame.text, "（…hel…💭）");
        assert!(!frame.is_final);
    }

    #[test]
    fn test_custom_marker() {
        let style = InterimStyle::new("[", "...]");
        assert_eq!(style.wrap("draft"), "[draft...]");
    }
}
