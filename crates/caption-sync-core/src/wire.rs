//! Wire payloads exchanged with the transcript backend.
//!
//! All payloads are JSON. Field names follow the backend verbatim.
//!
//! ```text
//! pull request   { "channels": [ { "name", "retrieved_id", "count" } ] }
//! pull response  { "channel_data": { "<channel>": [ datum, ... ] } }   newest first
//! push single    { "channel_datum": datum }
//! push batch     { "channel_data": [ datum, ... ] }                     application order
//! ```
//!
//! Inbound data are held as [`RawDatum`] and typed one at a time, so a datum
//! with a wrong field type is rejected alone and never takes its envelope
//! down with it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, MalformedEvent, Result};
use crate::types::EventId;

/// A datum as it appears on the wire.
///
/// Every field is optional here; required fields are enforced by
/// [`crate::validate_datum`] so a single incomplete datum can be dropped
/// without rejecting the payload that carried it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDatum {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<Vec<String>>,
    /// RFC 3339 timestamp assigned by the backend. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
}

impl WireDatum {
    /// Build an outbound datum for submission over a push connection.
    ///
    /// Outbound data carry no id; the backend assigns one.
    pub fn outbound(channel: impl Into<String>, content: impl Into<String>, is_final: bool) -> Self {
        let flags = if is_final {
            vec![crate::FLAG_IS_FINAL.to_string()]
        } else {
            Vec::new()
        };
        Self {
            channel: Some(channel.into()),
            content: Some(content.into()),
            id: None,
            flags: Some(flags),
            datetime: None,
        }
    }

    /// Check whether a flag token is present.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags
            .as_ref()
            .map(|flags| flags.iter().any(|f| f == flag))
            .unwrap_or(false)
    }

    /// Fill in the channel name when the datum omits it.
    pub fn with_default_channel(mut self, channel: &str) -> Self {
        if self.channel.is_none() {
            self.channel = Some(channel.to_string());
        }
        self
    }
}

/// An inbound datum as untyped JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawDatum(Value);

impl RawDatum {
    /// Wrap an arbitrary JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The underlying JSON.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Type the datum. A field of the wrong type rejects this datum only.
    pub fn into_datum(self) -> std::result::Result<WireDatum, MalformedEvent> {
        serde_json::from_value(self.0).map_err(|e| MalformedEvent::IllTyped(e.to_string()))
    }

    /// Fill in the channel name when the datum omits it.
    pub fn with_default_channel(mut self, channel: &str) -> Self {
        if let Value::Object(fields) = &mut self.0 {
            fields
                .entry("channel")
                .or_insert_with(|| Value::String(channel.to_string()));
        }
        self
    }
}

impl From<WireDatum> for RawDatum {
    fn from(datum: WireDatum) -> Self {
        // Only strings, integers and string lists: serialization cannot fail.
        Self(serde_json::to_value(datum).unwrap_or_default())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pull
// ─────────────────────────────────────────────────────────────────────────────

/// One channel's entry in a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRequest {
    /// Channel name.
    pub name: String,
    /// Highest id already applied for this channel.
    pub retrieved_id: EventId,
    /// Maximum number of items wanted.
    pub count: usize,
}

/// A batched pull request covering every registered channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub channels: Vec<ChannelRequest>,
}

impl PullRequest {
    /// Items requested per channel. Only the newest unseen item is needed.
    pub const LATEST_ONLY: usize = 1;

    /// Build a request from `(channel, cursor)` pairs.
    pub fn latest<I, S>(cursors: I) -> Self
    where
        I: IntoIterator<Item = (S, EventId)>,
        S: Into<String>,
    {
        Self {
            channels: cursors
                .into_iter()
                .map(|(name, retrieved_id)| ChannelRequest {
                    name: name.into(),
                    retrieved_id,
                    count: Self::LATEST_ONLY,
                })
                .collect(),
        }
    }

    /// Whether the request names no channel at all.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// A pull response: channel name to a newest-first list of data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    #[serde(default)]
    pub channel_data: HashMap<String, Vec<RawDatum>>,
}

impl PullResponse {
    /// Decode a response body.
    pub fn decode(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// The newest datum for `channel`, if the response carries any.
    ///
    /// A datum without a channel field inherits the key it was listed under.
    pub fn latest(&self, channel: &str) -> Option<RawDatum> {
        self.channel_data
            .get(channel)
            .and_then(|data| data.first())
            .cloned()
            .map(|datum| datum.with_default_channel(channel))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Push
// ─────────────────────────────────────────────────────────────────────────────

/// A message received on (or sent over) a push connection.
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    /// `{ "channel_datum": datum }`
    Single(RawDatum),
    /// `{ "channel_data": [datum, ...] }`, in application order.
    Batch(Vec<RawDatum>),
}

#[derive(Deserialize)]
struct PushEnvelopeIn {
    #[serde(default)]
    channel_datum: Option<RawDatum>,
    #[serde(default)]
    channel_data: Option<Vec<RawDatum>>,
}

#[derive(Serialize)]
struct PushEnvelopeOut<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_datum: Option<&'a RawDatum>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_data: Option<&'a [RawDatum]>,
}

impl PushMessage {
    /// Decode a text frame.
    ///
    /// When both keys are present the single datum wins.
    pub fn decode(text: &str) -> Result<Self> {
        let envelope: PushEnvelopeIn = serde_json::from_str(text)?;
        match (envelope.channel_datum, envelope.channel_data) {
            (Some(datum), _) => Ok(PushMessage::Single(datum)),
            (None, Some(data)) => Ok(PushMessage::Batch(data)),
            (None, None) => Err(CoreError::EmptyPushMessage),
        }
    }

    /// Encode as a text frame.
    pub fn encode(&self) -> Result<String> {
        let envelope = match self {
            PushMessage::Single(datum) => PushEnvelopeOut {
                channel_datum: Some(datum),
                channel_data: None,
            },
            PushMessage::Batch(data) => PushEnvelopeOut {
                channel_datum: None,
                channel_data: Some(data),
            },
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    /// A single outbound datum.
    pub fn single(datum: WireDatum) -> Self {
        PushMessage::Single(datum.into())
    }

    /// Normalize to an ordered list of data.
    pub fn into_data(self) -> Vec<RawDatum> {
        match self {
            PushMessage::Single(datum) => vec![datum],
            PushMessage::Batch(data) => data,
        }
    }

    /// Number of data carried.
    pub fn len(&self) -> usize {
        match self {
            PushMessage::Single(_) => 1,
            PushMessage::Batch(data) => data.len(),
        }
    }

    /// Whether the message carries no data (an empty batch).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_single() {
        let msg = PushMessage::decode(
            r#"{"channel_datum":{"channel":"user","content":"a","flags":["is_final"],"id":711}}"#,
        )
        .unwrap();
        match msg {
            PushMessage::Single(raw) => {
                let datum = raw.into_datum().unwrap();
                assert_eq!(datum.channel.as_deref(), Some("user"));
                assert_eq!(datum.id, Some(711));
                assert!(datum.has_flag("is_final"));
            }
            other => panic!("expected Single, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_batch_keeps_order() {
        let msg = PushMessage::decode(
            r#"{"channel_data":[
                {"channel":"user","content":"a","flags":[],"id":1},
                {"channel":"user","content":"ab","flags":["is_final"],"id":2}
            ],"channel_datum":null}"#,
        )
        .unwrap();
        let data: Vec<WireDatum> = msg
            .into_data()
            .into_iter()
            .map(|raw| raw.into_datum().unwrap())
            .collect();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].id, Some(1));
        assert_eq!(data[1].id, Some(2));
    }

    #[test]
    fn test_ill_typed_datum_spares_its_batch() {
        let msg = PushMessage::decode(
            r#"{"channel_data":[
                {"channel":"user","content":"a","flags":[],"id":1},
                {"channel":"user","content":"ab","flags":[],"id":"2"},
                {"channel":"user","content":"abc","flags":["is_final"],"id":3}
            ]}"#,
        )
        .unwrap();

        let typed: Vec<_> = msg.into_data().into_iter().map(RawDatum::into_datum).collect();
        assert_eq!(typed.len(), 3);
        assert_eq!(typed[0].as_ref().unwrap().id, Some(1));
        assert!(matches!(typed[1], Err(MalformedEvent::IllTyped(_))));
        assert_eq!(typed[2].as_ref().unwrap().id, Some(3));
    }

    #[test]
    fn test_ill_typed_fields_are_rejected() {
        for json in [
            r#"{"channel":"user","content":"a","id":"2"}"#,
            r#"{"channel":"user","content":"a","id":2,"flags":"is_final"}"#,
            r#"{"channel":"user","content":5,"id":2}"#,
            r#""just a string""#,
        ] {
            let raw = RawDatum::new(serde_json::from_str(json).unwrap());
            assert!(
                matches!(raw.into_datum(), Err(MalformedEvent::IllTyped(_))),
                "{}",
                json
            );
        }
    }

    #[test]
    fn test_decode_incomplete_datum_still_parses() {
        // Required fields are enforced per datum, not per message.
        let msg = PushMessage::decode(r#"{"channel_datum":{"content":"nyanko"}}"#).unwrap();
        assert_eq!(msg.len(), 1);
    }

    #[test]
    fn test_decode_rejects_empty_envelope() {
        let err = PushMessage::decode(r#"{"something":"else"}"#).unwrap_err();
        assert!(matches!(err, CoreError::EmptyPushMessage));

        let err = PushMessage::decode("not json").unwrap_err();
        assert!(matches!(err, CoreError::Json(_)));
    }

    #[test]
    fn test_encode_outbound_single() {
        let msg = PushMessage::single(WireDatum::outbound("user", "hi", true));
        let text = msg.encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["channel_datum"]["channel"], "user");
        assert_eq!(value["channel_datum"]["flags"][0], "is_final");
        assert!(value.get("channel_data").is_none());
        assert!(value["channel_datum"].get("id").is_none());
    }

    #[test]
    fn test_pull_request_shape() {
        let request = PullRequest::latest([("user", EventId::new(3)), ("ai", EventId::ZERO)]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "channels": [
                    { "name": "user", "retrieved_id": 3, "count": 1 },
                    { "name": "ai", "retrieved_id": 0, "count": 1 }
                ]
            })
        );
    }

    #[test]
    fn test_pull_response_latest_is_first() {
        let response = PullResponse::decode(
            br#"{"channel_data":{"user":[
                {"id":9,"content":"newest","flags":["is_final"]},
                {"id":8,"content":"older","flags":[]}
            ],"ai":[]}}"#,
        )
        .unwrap();

        let latest = response.latest("user").unwrap().into_datum().unwrap();
        assert_eq!(latest.id, Some(9));
        assert_eq!(latest.channel.as_deref(), Some("user"));
        assert!(response.latest("ai").is_none());
        assert!(response.latest("missing").is_none());
    }

    #[test]
    fn test_pull_response_isolates_ill_typed_channel() {
        let response = PullResponse::decode(
            br#"{"channel_data":{
                "user":[{"id":3,"content":"hello","flags":["is_final"]}],
                "ai":[{"id":"x","content":"broken","flags":[]}]
            }}"#,
        )
        .unwrap();

        let user = response.latest("user").unwrap().into_datum().unwrap();
        assert_eq!(user.id, Some(3));
        assert_eq!(user.content.as_deref(), Some("hello"));
        assert!(response.latest("ai").unwrap().into_datum().is_err());
    }

    #[test]
    fn test_pull_response_without_channel_data() {
        let response = PullResponse::decode(b"{}").unwrap();
        assert!(response.channel_data.is_empty());
    }
}
