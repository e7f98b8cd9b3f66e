//! Session configuration
//!
//! Fluent builder for [`Session`]: transport origin, heartbeat cadence,
//! reconnection policy, and optional metrics. The defaults match the
//! protocol's documented intervals: a 45 second heartbeat with a 15 second
//! pong deadline, and a fixed 5 second delay between reconnect attempts.
//!
//! # Examples
//!
//! ```rust,no_run
//! use ddp_client::{ExponentialBackoff, SessionBuilder};
//! use std::time::Duration;
//!
//! # async fn example() -> ddp_core::Result<()> {
//! let session = SessionBuilder::new("ws://localhost:3000/websocket")
//!     .origin("http://localhost")
//!     .heartbeat_interval(Duration::from_secs(30))
//!     .reconnect(Box::new(
//!         ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(30))
//!             .with_jitter(),
//!     ))
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use ddp_core::Result;

use crate::metrics::SessionMetrics;
use crate::reconnect::{FixedDelay, NoReconnect, ReconnectionStrategy};
use crate::session::Session;

/// Max idle time before the session probes the server.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(45);

/// Max wait for the matching pong before reconnecting.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(15);

/// Builder for configuring and connecting a [`Session`].
pub struct SessionBuilder {
    pub(crate) url: String,
    pub(crate) origin: Option<String>,
    pub(crate) heartbeat_interval: Duration,
    pub(crate) heartbeat_timeout: Duration,
    pub(crate) strategy: Box<dyn ReconnectionStrategy>,
    pub(crate) metrics: Option<Arc<SessionMetrics>>,
}

impl SessionBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            origin: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            strategy: Box::new(FixedDelay::default()),
            metrics: None,
        }
    }

    /// Set the `Origin` header presented on the WebSocket handshake.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Max idle time before a self-initiated ping.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Max wait for a heartbeat pong before the session reconnects.
    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    /// Replace the reconnection delay policy.
    pub fn reconnect(mut self, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Disable reconnection; the first transport loss is terminal.
    pub fn no_reconnect(mut self) -> Self {
        self.strategy = Box::new(NoReconnect);
        self
    }

    /// Attach OpenTelemetry instruments.
    pub fn metrics(mut self, metrics: Arc<SessionMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Dial the server, start the session tasks, and send the first
    /// negotiation message. Returns without waiting for the server's
    /// acknowledgement; use [`Session::state`] to observe negotiation.
    pub async fn connect(self) -> Result<Session> {
        Session::establish(self).await
    }
}
