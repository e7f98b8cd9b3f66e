//! Session lifecycle state
//!
//! The session moves through a small set of states:
//!
//! ```text
//! Dialing → Negotiating → Live
//!                ↑          ↓
//!              Reconnecting ← (transport lost / ping timeout)
//!                ↓
//!              Closed (explicit close, version rejection, or retries
//!                      exhausted)
//! ```
//!
//! Alongside the state enum lives the connection context: the session
//! token issued by the server at negotiation (required for resume), the
//! negotiated protocol version, and the optional server cluster id.

use std::sync::Arc;
use tokio::sync::RwLock;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Establishing the initial transport.
    Dialing,
    /// Transport up, `connect` sent, waiting for `connected`.
    Negotiating,
    /// Session established and usable.
    Live,
    /// Transport lost; the reconnect sequence is running.
    Reconnecting,
    /// Terminal. Entered on explicit close, protocol rejection, or when
    /// reconnect attempts are exhausted.
    Closed,
}

impl SessionState {
    /// Numeric code for metrics gauges.
    pub(crate) fn code(self) -> i64 {
        match self {
            SessionState::Dialing => 0,
            SessionState::Negotiating => 1,
            SessionState::Live => 2,
            SessionState::Reconnecting => 3,
            SessionState::Closed => 4,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ConnectionContext {
    session: Option<String>,
    version: Option<String>,
    server_id: Option<String>,
}

/// Shared lifecycle state and connection context.
#[derive(Clone)]
pub(crate) struct SharedState {
    state: Arc<RwLock<SessionState>>,
    context: Arc<RwLock<ConnectionContext>>,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::Dialing)),
            context: Arc::new(RwLock::new(ConnectionContext::default())),
        }
    }

    pub(crate) async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub(crate) async fn set_state(&self, state: SessionState) {
        *self.state.write().await = state;
    }

    pub(crate) async fn is_closed(&self) -> bool {
        self.state().await == SessionState::Closed
    }

    /// Record the outcome of a negotiation. The token is only ever
    /// replaced here, by a subsequent full negotiation.
    pub(crate) async fn record_session(&self, token: String, version: &str) {
        let mut context = self.context.write().await;
        context.session = Some(token);
        context.version = Some(version.to_string());
    }

    pub(crate) async fn record_server_id(&self, server_id: String) {
        self.context.write().await.server_id = Some(server_id);
    }

    pub(crate) async fn session_token(&self) -> Option<String> {
        self.context.read().await.session.clone()
    }

    pub(crate) async fn version(&self) -> Option<String> {
        self.context.read().await.version.clone()
    }

    pub(crate) async fn server_id(&self) -> Option<String> {
        self.context.read().await.server_id.clone()
    }
}
