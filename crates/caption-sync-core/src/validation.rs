//! Required-field validation for wire data.
//!
//! A datum must name a channel, carry content and carry a positive id.
//! Flags are optional; a datum without flags is treated as interim.

use crate::error::MalformedEvent;
use crate::event::{UpdateEvent, FLAG_IS_FINAL};
use crate::types::EventId;
use crate::wire::{RawDatum, WireDatum};

/// Validate a wire datum into an [`UpdateEvent`].
pub fn validate_datum(datum: WireDatum) -> Result<UpdateEvent, MalformedEvent> {
    let is_final = datum.has_flag(FLAG_IS_FINAL);

    let channel = datum.channel.ok_or(MalformedEvent::MissingField("channel"))?;
    if channel.is_empty() {
        return Err(MalformedEvent::EmptyChannel);
    }

    let content = datum.content.ok_or(MalformedEvent::MissingField("content"))?;

    let id = datum.id.ok_or(MalformedEvent::MissingField("id"))?;
    if id == 0 {
        return Err(MalformedEvent::InvalidId(id));
    }

    Ok(UpdateEvent {
        channel,
        id: EventId::new(id),
        content,
        is_final,
    })
}

/// Type and validate an inbound datum.
pub fn validate_raw(raw: RawDatum) -> Result<UpdateEvent, MalformedEvent> {
    validate_datum(raw.into_datum()?)
}

impl TryFrom<WireDatum> for UpdateEvent {
    type Error = MalformedEvent;

    fn try_from(datum: WireDatum) -> Result<Self, Self::Error> {
        validate_datum(datum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> WireDatum {
        WireDatum {
            channel: Some("user".into()),
            content: Some("hello".into()),
            id: Some(3),
            flags: Some(vec![FLAG_IS_FINAL.into()]),
            datetime: Some("2023-09-23T13:45:36.105217600Z".into()),
        }
    }

    #[test]
    fn test_valid_datum() {
        let event = validate_datum(complete()).unwrap();
        assert_eq!(event, UpdateEvent::final_text("user", 3, "hello"));
    }

    #[test]
    fn test_missing_flags_is_interim() {
        let datum = WireDatum {
            flags: None,
            ..complete()
        };
        let event = validate_datum(datum).unwrap();
        assert!(!event.is_final);
    }

    #[test]
    fn test_missing_channel() {
        let datum = WireDatum {
            channel: None,
            ..complete()
        };
        assert_eq!(
            validate_datum(datum),
            Err(MalformedEvent::MissingField("channel"))
        );
    }

    #[test]
    fn test_empty_channel() {
        let datum = WireDatum {
            channel: Some(String::new()),
            ..complete()
        };
        assert_eq!(validate_datum(datum), Err(MalformedEvent::EmptyChannel));
    }

    #[test]
    fn test_missing_content() {
        let datum = WireDatum {
            content: None,
            ..complete()
        };
        assert_eq!(
            validate_datum(datum),
            Err(MalformedEvent::MissingField("content"))
        );
    }

    #[test]
    fn test_missing_or_zero_id() {
        let datum = WireDatum {
            id: None,
            ..complete()
        };
        assert_eq!(validate_datum(datum), Err(MalformedEvent::MissingField("id")));

        let datum = WireDatum {
            id: Some(0),
            ..complete()
        };
        assert_eq!(validate_datum(datum), Err(MalformedEvent::InvalidId(0)));
    }

    #[test]
    fn test_raw_datum() {
        let raw = RawDatum::new(serde_json::json!({
            "channel": "user", "content": "hello", "id": 3, "flags": ["is_final"]
        }));
        assert_eq!(
            validate_raw(raw),
            Ok(UpdateEvent::final_text("user", 3, "hello"))
        );

        let raw = RawDatum::new(serde_json::json!({ "channel": "user", "content": "x", "id": -1 }));
        assert!(matches!(validate_raw(raw), Err(MalformedEvent::IllTyped(_))));

        let raw = RawDatum::from(WireDatum { id: None, ..complete() });
        assert_eq!(validate_raw(raw), Err(MalformedEvent::MissingField("id")));
    }

    #[test]
    fn test_empty_content_is_valid() {
        let datum = WireDatum {
            content: Some(String::new()),
            ..complete()
        };
        assert!(validate_datum(datum).is_ok());
    }
}
