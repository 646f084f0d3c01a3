//! Known wire payloads with their expected decoding.
//!
//! These pin the JSON shapes exchanged with the backend so a change to the
//! serde model that breaks compatibility shows up as a vector failure.

use caption_sync_core::WireDatum;

/// A push payload and the data it carries, in application order.
///
/// `None` marks a datum that is rejected on its own while its siblings
/// still decode.
#[derive(Debug, Clone)]
pub struct PushVector {
    pub name: &'static str,
    pub json: &'static str,
    pub expected: Vec<Option<WireDatum>>,
}

/// A pull response and the newest datum expected for `channel`.
#[derive(Debug, Clone)]
pub struct PullVector {
    pub name: &'static str,
    pub json: &'static str,
    pub channel: &'static str,
    pub expected_latest: Option<WireDatum>,
}

/// A payload that must be rejected as a whole.
#[derive(Debug, Clone)]
pub struct RejectVector {
    pub name: &'static str,
    pub json: &'static str,
}

/// A single datum that must be dropped as malformed.
#[derive(Debug, Clone)]
pub struct MalformedVector {
    pub name: &'static str,
    pub datum: &'static str,
}

fn datum(channel: &str, id: u64, content: &str, flags: &[&str]) -> WireDatum {
    WireDatum {
        channel: Some(channel.to_string()),
        content: Some(content.to_string()),
        id: Some(id),
        flags: Some(flags.iter().map(|f| f.to_string()).collect()),
        datetime: None,
    }
}

/// All push vectors.
pub fn push_vectors() -> Vec<PushVector> {
    vec![
        PushVector {
            name: "single final",
            json: r#"{"channel_datum":{"channel":"user","content":"hello","id":711,"flags":["is_final"]}}"#,
            expected: vec![Some(datum("user", 711, "hello", &["is_final"]))],
        },
        PushVector {
            name: "single interim with extra fields",
            json: r#"{"channel_datum":{"channel":"user","content":"hel","id":710,"flags":[],"datetime":"2024-01-01T00:00:00Z","speaker":"a"}}"#,
            expected: vec![Some(WireDatum {
                datetime: Some("2024-01-01T00:00:00Z".to_string()),
                ..datum("user", 710, "hel", &[])
            })],
        },
        PushVector {
            name: "batch keeps order",
            json: r#"{"channel_data":[
                {"channel":"user","content":"a","id":1,"flags":[]},
                {"channel":"ai","content":"b","id":1,"flags":["is_final"]},
                {"channel":"user","content":"ab","id":2,"flags":["is_final"]}
            ]}"#,
            expected: vec![
                Some(datum("user", 1, "a", &[])),
                Some(datum("ai", 1, "b", &["is_final"])),
                Some(datum("user", 2, "ab", &["is_final"])),
            ],
        },
        PushVector {
            name: "batch with an ill-typed id",
            json: r#"{"channel_data":[
                {"channel":"user","content":"a","id":1,"flags":[]},
                {"channel":"user","content":"ab","id":"2","flags":[]},
                {"channel":"user","content":"abc","id":3,"flags":["is_final"]}
            ]}"#,
            expected: vec![
                Some(datum("user", 1, "a", &[])),
                None,
                Some(datum("user", 3, "abc", &["is_final"])),
            ],
        },
        PushVector {
            name: "empty batch",
            json: r#"{"channel_data":[]}"#,
            expected: vec![],
        },
    ]
}

/// All pull vectors.
pub fn pull_vectors() -> Vec<PullVector> {
    vec![
        PullVector {
            name: "newest first",
            json: r#"{"channel_data":{"user":[
                {"id":3,"content":"hello","flags":["is_final"]},
                {"id":2,"content":"hel","flags":[]}
            ]}}"#,
            channel: "user",
            expected_latest: Some(datum("user", 3, "hello", &["is_final"])),
        },
        PullVector {
            name: "empty list",
            json: r#"{"channel_data":{"user":[]}}"#,
            channel: "user",
            expected_latest: None,
        },
        PullVector {
            name: "channel absent",
            json: r#"{"channel_data":{"ai":[{"id":1,"content":"x","flags":[]}]}}"#,
            channel: "user",
            expected_latest: None,
        },
        PullVector {
            name: "missing channel_data",
            json: r#"{}"#,
            channel: "user",
            expected_latest: None,
        },
    ]
}

/// Data that must each be dropped without affecting anything else.
pub fn malformed_vectors() -> Vec<MalformedVector> {
    vec![
        MalformedVector {
            name: "id as string",
            datum: r#"{"channel":"user","content":"a","id":"2","flags":[]}"#,
        },
        MalformedVector {
            name: "negative id",
            datum: r#"{"channel":"user","content":"a","id":-1,"flags":[]}"#,
        },
        MalformedVector {
            name: "flags as string",
            datum: r#"{"channel":"user","content":"a","id":2,"flags":"is_final"}"#,
        },
        MalformedVector {
            name: "content as number",
            datum: r#"{"channel":"user","content":5,"id":2,"flags":[]}"#,
        },
        MalformedVector {
            name: "missing id",
            datum: r#"{"channel":"user","content":"a","flags":[]}"#,
        },
        MalformedVector {
            name: "zero id",
            datum: r#"{"channel":"user","content":"a","id":0,"flags":[]}"#,
        },
        MalformedVector {
            name: "not an object",
            datum: r#""user""#,
        },
    ]
}

/// Push payloads that must fail to decode.
pub fn reject_vectors() -> Vec<RejectVector> {
    vec![
        RejectVector {
            name: "not json",
            json: "hello",
        },
        RejectVector {
            name: "neither key",
            json: r#"{"something":1}"#,
        },
        RejectVector {
            name: "batch is not a list",
            json: r#"{"channel_data":{"user":[]}}"#,
        },
        RejectVector {
            name: "single datum is null",
            json: r#"{"channel_datum":null}"#,
        },
    ]
}
