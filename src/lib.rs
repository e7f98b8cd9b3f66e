//! DDP — JSON-framed RPC and live data synchronization over WebSocket
//!
//! This is the convenience crate that re-exports the DDP sub-crates. Use
//! it if you want a single dependency for the whole client.
//!
//! # Architecture
//!
//! - **ddp-core**: wire messages, codec, error types
//! - **ddp-client**: the session engine (calls, subscriptions, heartbeats,
//!   reconnection and resume)
//!
//! # Quick start
//!
//! ```rust,no_run
//! use ddp::Session;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> ddp::Result<()> {
//!     let session = Session::connect("ws://localhost:3000/websocket").await?;
//!     let reply = session.call("echo", vec![json!("hello")]).await?;
//!     println!("{reply}");
//!     session.close().await;
//!     Ok(())
//! }
//! ```

// Re-export the sub-crates under stable module names
pub use ddp_client as client;
pub use ddp_core as core;

// Convenience re-exports of the most commonly used types
pub use ddp_client::{CollectionHandler, Session, SessionBuilder, SessionState, Subscription};
pub use ddp_core::{ClientMessage, DataEvent, Error, Result, ServerMessage};
