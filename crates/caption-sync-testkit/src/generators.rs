//! Proptest generators for property-based testing.

use proptest::prelude::*;

use caption_sync_core::{EventId, UpdateEvent, WireDatum};

/// A positive event id.
pub fn event_id() -> impl Strategy<Value = EventId> {
    (1u64..=u64::MAX).prop_map(EventId::new)
}

/// A small positive id, so sequences collide and repeat.
pub fn small_id() -> impl Strategy<Value = u64> {
    1u64..64
}

/// Display text, including non-ASCII.
pub fn content() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ぁ-んァ-ン、。!?]{0,24}"
}

/// An update event on `channel`.
pub fn update_event(channel: &'static str) -> impl Strategy<Value = UpdateEvent> {
    (small_id(), content(), any::<bool>()).prop_map(move |(id, content, is_final)| UpdateEvent {
        channel: channel.to_string(),
        id: EventId::new(id),
        content,
        is_final,
    })
}

/// An arbitrary delivery order on `channel`: gaps, duplicates, reordering.
pub fn delivery(channel: &'static str, max_len: usize) -> impl Strategy<Value = Vec<UpdateEvent>> {
    prop::collection::vec(update_event(channel), 1..=max_len)
}

/// A wire datum that may be missing any field.
pub fn wire_datum() -> impl Strategy<Value = WireDatum> {
    (
        prop::option::of(prop_oneof![Just("user".to_string()), Just(String::new())]),
        prop::option::of(content()),
        prop::option::of(0u64..8),
        prop::option::of(prop::collection::vec(
            prop_oneof![Just("is_final".to_string()), Just("other".to_string())],
            0..3,
        )),
    )
        .prop_map(|(channel, content, id, flags)| WireDatum {
            channel,
            content,
            id,
            flags,
            datetime: None,
        })
}
