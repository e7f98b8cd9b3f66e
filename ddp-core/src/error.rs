//! Error types for the DDP client
//!
//! A single `Error` enum covers every failure class the session engine can
//! surface:
//!
//! - **Transport failures**: dial, read, or write errors on the WebSocket.
//!   These are recovered internally by reconnecting and are not normally
//!   surfaced to individual calls.
//! - **Protocol failures**: the server rejected every protocol version we
//!   support. Fatal for the session.
//! - **Ping timeouts**: a liveness probe went unanswered.
//! - **Method and subscription errors**: returned by the server for one
//!   specific call or subscription, surfaced only on that operation.
//!
//! The enum derives `Clone` so that a single failure (for example a version
//! rejection) can be fanned out to every pending operation.

use serde_json::Value;
use thiserror::Error;

/// Result type used throughout the DDP crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the session engine.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// WebSocket transport error (dial, read, or write).
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// JSON encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The transport is gone and will not come back. Pending work is
    /// completed with this error when the session closes or gives up
    /// reconnecting.
    #[error("connection closed")]
    ConnectionClosed,

    /// A liveness probe was not answered within its deadline.
    #[error("ping timeout")]
    PingTimeout,

    /// The server could not negotiate any protocol version we support.
    #[error("unsupported protocol version (server wants {wanted})")]
    VersionMismatch { wanted: String },

    /// The server returned an error for a method invocation.
    #[error("method error: {0}")]
    Method(String),

    /// The server refused a subscription.
    #[error("subscription error: {0}")]
    Subscription(String),

    /// Client-side invariant violation or misuse.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a method error from the `error` field of a `result` message.
    ///
    /// Servers usually send a string but the field is free-form, so
    /// anything else is rendered as compact JSON.
    pub fn method_failure(error: Value) -> Self {
        Error::Method(render(error))
    }

    /// Build a subscription error from the `error` field of a `nosub`
    /// message, tolerating a missing field.
    pub fn subscription_failure(error: Option<Value>) -> Self {
        match error {
            Some(value) => Error::Subscription(render(value)),
            None => Error::Subscription("subscription refused".to_string()),
        }
    }
}

fn render(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}
