//! Payload codec.
//!
//! Outbound messages are flattened into a [`RawPayload`] with the reserved
//! [`TYPE_KEY`] set to the message tag. Decoding is per message kind and lives
//! in [`Descriptor`](crate::Descriptor); this module only provides the serde
//! helpers descriptors and messages build on.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::{Error, Message, OutboundMessage, RawPayload, Result};

/// Reserved payload key holding the message tag.
pub const TYPE_KEY: &str = "__type";

/// Encode a message into a tagged payload.
///
/// The tag is inserted first and wins over a field with the same key.
pub fn encode(message: &dyn OutboundMessage) -> Result<RawPayload> {
    // ---
    let mut payload = RawPayload::new();
    payload.insert(TYPE_KEY.to_owned(), Value::from(message.tag()));

    for (key, value) in message.fields()? {
        payload.entry(key).or_insert(value);
    }

    Ok(payload)
}

/// Extract the tag from an inbound payload.
///
/// # Errors
///
/// Returns [`Error::MalformedPayload`] if the tag key is missing or not a
/// string.
pub fn tag_of(payload: &RawPayload) -> Result<&str> {
    // ---
    match payload.get(TYPE_KEY) {
        Some(Value::String(tag)) => Ok(tag),
        Some(other) => Err(Error::MalformedPayload(format!(
            "`{TYPE_KEY}` is not a string: {other}"
        ))),
        None => Err(Error::MalformedPayload(format!("missing `{TYPE_KEY}`"))),
    }
}

/// Flatten a serde-serializable message into fields.
///
/// Unit structs serialize to `null` and produce an empty mapping. Anything
/// else that is not a JSON object is rejected.
pub fn to_fields<M>(message: &M) -> Result<RawPayload>
where
    M: Message + Serialize,
{
    // ---
    match serde_json::to_value(message)? {
        Value::Object(fields) => Ok(fields),
        Value::Null => Ok(RawPayload::new()),
        _ => Err(Error::NotAnObject(M::TAG)),
    }
}

/// Rebuild a serde-deserializable message from a payload.
///
/// Fields the target type does not know about, including the tag, are
/// ignored unless the type opts into `deny_unknown_fields`.
pub fn from_fields<M>(payload: &RawPayload) -> Result<M>
where
    M: Message + DeserializeOwned,
{
    // ---
    serde_json::from_value(Value::Object(payload.clone())).map_err(|source| Error::Decode {
        tag: M::TAG,
        source,
    })
}
