//! Inbound message dispatch
//!
//! The dispatcher is the single consumer of the session inbox and the only
//! task that advances the protocol state machine. Messages from one
//! transport are processed strictly in arrival order. Transport errors
//! published by the inbound worker arrive on a separate channel and are
//! logged here; recovery is the reconnect controller's job, not the
//! dispatcher's.

use ddp_core::{ClientMessage, DataEvent, Error, ServerMessage, PROTOCOL_VERSION};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::session::Session;
use crate::state::SessionState;

pub(crate) struct Dispatcher {
    session: Session,
    inbox: mpsc::Receiver<Value>,
    errors: mpsc::Receiver<Error>,
    errors_open: bool,
}

impl Dispatcher {
    pub(crate) fn new(
        session: Session,
        inbox: mpsc::Receiver<Value>,
        errors: mpsc::Receiver<Error>,
    ) -> Self {
        Self {
            session,
            inbox,
            errors,
            errors_open: true,
        }
    }

    pub(crate) async fn run(mut self) {
        let shutdown = self.session.shutdown_signal();
        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                message = self.inbox.recv() => match message {
                    Some(raw) => self.dispatch(raw).await,
                    None => break,
                },
                error = self.errors.recv(), if self.errors_open => match error {
                    Some(error) => {
                        tracing::error!(url = %self.session.url(), error = %error, "transport error");
                    }
                    None => self.errors_open = false,
                },
            }
        }
        tracing::debug!("dispatcher exited");
    }

    async fn dispatch(&self, raw: Value) {
        tracing::debug!(message = %raw, "inbox");
        match ServerMessage::classify(raw) {
            ServerMessage::Connected { session } => self.on_connected(session).await,
            ServerMessage::Failed { version } => self.on_failed(version).await,

            ServerMessage::Ping { id } => {
                // answer with a pong echoing the probe id, if any
                let _ = self.session.send(&ClientMessage::pong(id)).await;
            }
            ServerMessage::Pong { id } => {
                self.session.pings.resolve(id.as_deref().unwrap_or("")).await;
            }

            ServerMessage::Nosub { id, error } => {
                if let Some(id) = id {
                    tracing::info!(id = %id, "subscription refused");
                    self.session
                        .subs
                        .mark_failed(&id, Error::subscription_failure(error))
                        .await;
                }
            }
            ServerMessage::Ready { subs } => {
                for id in subs {
                    self.session.subs.mark_ready(&id).await;
                }
            }

            ServerMessage::Added(event) => {
                self.deliver("added", &event).await.added(&event);
            }
            ServerMessage::Changed(event) => {
                self.deliver("changed", &event).await.changed(&event);
            }
            ServerMessage::Removed(event) => {
                self.deliver("removed", &event).await.removed(&event);
            }
            ServerMessage::AddedBefore(event) => {
                self.deliver("addedBefore", &event).await.added_before(&event);
            }
            ServerMessage::MovedBefore(event) => {
                self.deliver("movedBefore", &event).await.moved_before(&event);
            }

            ServerMessage::MethodResult { id, error, result } => {
                if let Some(id) = id {
                    let outcome = match error {
                        Some(error) => Err(Error::method_failure(error)),
                        None => Ok(result.unwrap_or(Value::Null)),
                    };
                    self.session.calls.complete(&id, outcome).await;
                }
            }
            // informational; nothing tracks write acknowledgements
            ServerMessage::Updated { .. } => {}

            ServerMessage::ServerInfo { server_id } => {
                tracing::debug!(server_id = %server_id, "server cluster hint");
                self.session.shared.record_server_id(server_id).await;
            }
            ServerMessage::Unknown { raw } => {
                tracing::warn!(message = %raw, "unexpected message from server");
            }
        }
    }

    async fn on_connected(&self, token: String) {
        self.session
            .shared
            .record_session(token.clone(), PROTOCOL_VERSION)
            .await;
        self.session.shared.set_state(SessionState::Live).await;
        if let Some(metrics) = &self.session.metrics {
            metrics.record_connection_state(SessionState::Live.code());
        }
        // automatic heartbeats start once the session is acknowledged
        self.session.heartbeat.start(self.session.clone()).await;
        tracing::info!(session = %token, "session established");
    }

    async fn on_failed(&self, version: Option<String>) {
        let wanted = version.unwrap_or_else(|| "unknown".to_string());
        tracing::error!(version = %wanted, "server supports no protocol version we speak");
        let error = Error::VersionMismatch { wanted };
        self.session.calls.fail_all(error.clone()).await;
        self.session.subs.fail_all(error).await;
        self.session.close().await;
    }

    async fn deliver(
        &self,
        kind: &str,
        event: &DataEvent,
    ) -> std::sync::Arc<dyn crate::collection::CollectionHandler> {
        if let Some(metrics) = &self.session.metrics {
            metrics.record_data_event(kind);
        }
        self.session
            .collections
            .get(event.collection.as_deref())
            .await
    }
}
