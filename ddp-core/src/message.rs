//! DDP wire messages
//!
//! The protocol frames every message as a JSON object whose `msg` field
//! discriminates the variant. This module models both directions:
//!
//! - [`ClientMessage`] is everything the client emits. It serializes to the
//!   exact wire shape, with optional fields omitted rather than sent as
//!   null.
//! - [`ServerMessage`] is everything the client consumes, as a sum type
//!   discriminated on `msg` with per-variant record types.
//!
//! Inbound classification is total: [`ServerMessage::classify`] never
//! fails. Unknown discriminators, malformed variants, and the undocumented
//! `server_id` cluster hint (an object with no `msg` field at all) each map
//! to their own variant so the dispatcher can decide what to do with them.
//! Tolerance to unknown message shapes is a protocol requirement, not an
//! error path.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol version spoken by this client.
pub const PROTOCOL_VERSION: &str = "1";

/// Messages emitted by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "msg", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Session negotiation, with an optional token to resume a prior
    /// session.
    Connect {
        version: String,
        support: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        session: Option<String>,
    },
    /// Method invocation.
    Method {
        id: String,
        method: String,
        params: Vec<Value>,
    },
    /// Subscription request.
    Sub {
        id: String,
        name: String,
        params: Vec<Value>,
    },
    /// Subscription cancellation.
    Unsub { id: String },
    /// Liveness probe. Anonymous pings carry no id on the wire.
    Ping {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Liveness reply, echoing the probe id when one was given.
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

impl ClientMessage {
    /// First negotiation on a fresh transport.
    pub fn connect() -> Self {
        ClientMessage::Connect {
            version: PROTOCOL_VERSION.to_string(),
            support: vec![PROTOCOL_VERSION.to_string()],
            session: None,
        }
    }

    /// Negotiation that reattaches to a prior session.
    pub fn resume(session: impl Into<String>) -> Self {
        ClientMessage::Connect {
            version: PROTOCOL_VERSION.to_string(),
            support: vec![PROTOCOL_VERSION.to_string()],
            session: Some(session.into()),
        }
    }

    pub fn method(id: impl Into<String>, method: impl Into<String>, params: Vec<Value>) -> Self {
        ClientMessage::Method {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    pub fn sub(id: impl Into<String>, name: impl Into<String>, params: Vec<Value>) -> Self {
        ClientMessage::Sub {
            id: id.into(),
            name: name.into(),
            params,
        }
    }

    pub fn unsub(id: impl Into<String>) -> Self {
        ClientMessage::Unsub { id: id.into() }
    }

    pub fn ping(id: Option<String>) -> Self {
        ClientMessage::Ping { id }
    }

    pub fn pong(id: Option<String>) -> Self {
        ClientMessage::Pong { id }
    }
}

/// Record shape shared by the five data-delta messages.
///
/// Every field is optional; servers send only what a given delta needs
/// (`fields` for adds and changes, `cleared` for changes, `before` for the
/// ordered variants).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DataEvent {
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub fields: Option<Map<String, Value>>,
    #[serde(default)]
    pub cleared: Option<Vec<String>>,
    #[serde(default)]
    pub before: Option<String>,
}

/// Messages consumed by the client, discriminated on the `msg` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "msg")]
pub enum ServerMessage {
    /// Negotiation succeeded; carries the session token used for resume.
    #[serde(rename = "connected")]
    Connected { session: String },

    /// Negotiation failed; no supported version overlaps. Fatal.
    #[serde(rename = "failed")]
    Failed {
        #[serde(default)]
        version: Option<String>,
    },

    /// Server-initiated liveness probe; must be answered with a pong.
    #[serde(rename = "ping")]
    Ping {
        #[serde(default)]
        id: Option<String>,
    },

    /// Reply to one of our pings.
    #[serde(rename = "pong")]
    Pong {
        #[serde(default)]
        id: Option<String>,
    },

    /// A subscription was refused or torn down by the server.
    #[serde(rename = "nosub")]
    Nosub {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        error: Option<Value>,
    },

    /// The initial snapshot for the listed subscriptions is complete.
    #[serde(rename = "ready")]
    Ready {
        #[serde(default)]
        subs: Vec<String>,
    },

    #[serde(rename = "added")]
    Added(DataEvent),

    #[serde(rename = "changed")]
    Changed(DataEvent),

    #[serde(rename = "removed")]
    Removed(DataEvent),

    #[serde(rename = "addedBefore")]
    AddedBefore(DataEvent),

    #[serde(rename = "movedBefore")]
    MovedBefore(DataEvent),

    /// Completion of a method invocation. Exactly one of `error` and
    /// `result` is meaningful.
    #[serde(rename = "result")]
    MethodResult {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        error: Option<Value>,
        #[serde(default)]
        result: Option<Value>,
    },

    /// The server finished writing the listed methods. Informational.
    #[serde(rename = "updated")]
    Updated {
        #[serde(default)]
        methods: Vec<String>,
    },

    /// Undocumented cluster hint: an object with no `msg` field but a
    /// `server_id`. Recorded, never treated as an error.
    #[serde(skip)]
    ServerInfo { server_id: String },

    /// Anything we do not understand. Logged and ignored downstream.
    #[serde(skip)]
    Unknown { raw: Value },
}

impl ServerMessage {
    /// Classify a decoded inbound object. Total: shapes that do not parse
    /// as a known variant come back as [`ServerMessage::Unknown`] rather
    /// than an error.
    pub fn classify(raw: Value) -> ServerMessage {
        let has_msg = match raw.as_object() {
            Some(obj) => obj.contains_key("msg"),
            None => return ServerMessage::Unknown { raw },
        };
        if !has_msg {
            if let Some(Value::String(server_id)) = raw.get("server_id") {
                return ServerMessage::ServerInfo {
                    server_id: server_id.clone(),
                };
            }
            return ServerMessage::Unknown { raw };
        }
        match ServerMessage::deserialize(&raw) {
            Ok(message) => message,
            Err(_) => ServerMessage::Unknown { raw },
        }
    }
}
