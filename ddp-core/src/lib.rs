//! Core wire types and codec for the DDP client
//!
//! This crate provides the foundation the session engine is built on:
//!
//! - **Messages**: the client-emitted message set and the server message
//!   sum type, discriminated on the protocol's `msg` field
//! - **Codec**: JSON encoding and decoding with crate-level errors
//! - **Errors**: the full error taxonomy, from transport failures to
//!   per-call method errors
//!
//! The crate is transport-agnostic. It knows the shape of every frame but
//! nothing about how frames move; the `ddp-client` crate supplies the
//! WebSocket transport, the session state machine, and the reconnect
//! logic on top of this foundation.
//!
//! # Example
//!
//! ```rust
//! use ddp_core::{codec, ClientMessage, ServerMessage};
//!
//! let text = codec::encode(&ClientMessage::method("1", "echo", vec!["x".into()])).unwrap();
//! assert!(text.contains(r#""msg":"method""#));
//!
//! let inbound = codec::decode(r#"{"msg":"pong","id":"1"}"#).unwrap();
//! let message = ServerMessage::classify(inbound);
//! assert_eq!(message, ServerMessage::Pong { id: Some("1".into()) });
//! ```

pub mod codec;
pub mod error;
pub mod message;

pub use error::{Error, Result};
pub use message::{ClientMessage, DataEvent, ServerMessage, PROTOCOL_VERSION};
