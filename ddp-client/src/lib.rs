//! DDP session engine
//!
//! Client for a JSON-framed RPC and live-data protocol spoken over a
//! persistent bidirectional transport (a WebSocket). A [`Session`] gives
//! you:
//!
//! - **Method calls** with response correlation: [`Session::call`] and the
//!   asynchronous [`Session::invoke`]
//! - **Subscriptions** to server-pushed data streams: [`Session::sub`],
//!   [`Session::subscribe`], with data-delta events routed to registered
//!   [`CollectionHandler`]s
//! - **Liveness**: automatic heartbeats plus [`Session::ping`] and
//!   [`Session::ping_pong`]
//! - **Resume**: on transport loss the session reconnects, presents its
//!   session token, retransmits in-flight calls and active subscriptions
//!   with their original ids, and resets collections for the server to
//!   repopulate
//!
//! # Quick start
//!
//! ```rust,no_run
//! use ddp_client::Session;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> ddp_core::Result<()> {
//!     let session = Session::connect("ws://localhost:3000/websocket").await?;
//!
//!     let reply = session.call("echo", vec![json!("x")]).await?;
//!     println!("echoed {reply}");
//!
//!     session.sub("all-tasks", vec![]).await?;
//!     session.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Cloning and concurrency
//!
//! `Session` is cheaply cloneable; clones share one connection. Calls may
//! be issued from any task. Because in-flight methods are retransmitted on
//! resume, methods should be idempotent; that contract is on the caller.

mod builder;
mod call;
mod collection;
mod dispatch;
mod heartbeat;
mod ids;
mod metrics;
mod ping;
mod reconnect;
mod session;
mod state;
mod sub;

pub use builder::{SessionBuilder, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_HEARTBEAT_TIMEOUT};
pub use call::MethodCall;
pub use collection::CollectionHandler;
pub use metrics::SessionMetrics;
pub use reconnect::{
    ExponentialBackoff, FixedDelay, NoReconnect, ReconnectionStrategy, DEFAULT_RECONNECT_INTERVAL,
};
pub use session::Session;
pub use state::SessionState;
pub use sub::Subscription;
