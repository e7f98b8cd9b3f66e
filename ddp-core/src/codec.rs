//! JSON codec for DDP messages
//!
//! Thin wrappers over `serde_json` that map failures into the crate's
//! [`Error`](crate::Error) type. Inbound frames decode to a raw
//! [`serde_json::Value`] first; classification into a typed
//! [`ServerMessage`](crate::ServerMessage) happens later in the dispatcher,
//! because the protocol requires tolerating shapes serde alone would
//! reject.

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;

/// Encode any serializable message to its wire text.
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode one inbound frame to a raw JSON value.
///
/// A decode failure here is transport-fatal for the connection that
/// produced it; the caller decides whether the resulting value (which may
/// legitimately be `null` or a non-object) is worth dispatching.
pub fn decode(data: &str) -> Result<Value> {
    serde_json::from_str(data).map_err(|e| Error::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ClientMessage;

    #[test]
    fn encode_then_decode_round_trips() {
        let text = encode(&ClientMessage::unsub("s9")).unwrap();
        let value = decode(&text).unwrap();
        assert_eq!(value["msg"], "unsub");
        assert_eq!(value["id"], "s9");
    }

    #[test]
    fn decode_rejects_invalid_json() {
        assert!(matches!(decode("{nope"), Err(Error::Serialization(_))));
    }

    #[test]
    fn decode_passes_null_through() {
        assert_eq!(decode("null").unwrap(), Value::Null);
    }
}
