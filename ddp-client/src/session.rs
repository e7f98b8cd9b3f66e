//! Session facade and transport plumbing
//!
//! A [`Session`] is cheaply cloneable; all clones share the same
//! connection and state, so it can be used from any number of tasks. Two
//! long-lived tasks serve each session: the inbound worker, which reads
//! frames off the transport and feeds the bounded inbox, and the
//! dispatcher, which is the inbox's single consumer and drives the
//! protocol state machine. The heartbeat driver and the per-ping timeout
//! tasks come and go around them.
//!
//! # Reconnection
//!
//! When the transport dies (read error, ping timeout), the reconnect
//! controller tears it down, dials a new one under the configured delay
//! strategy, and resumes the session: it presents the prior session token,
//! retransmits every in-flight method call and active subscription with
//! their original ids, and resets the registered collections so the server
//! can resend them. Methods must therefore be idempotent under
//! retransmission; that is a contract on callers. Exactly one reconnect
//! sequence runs at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use ddp_core::{codec, ClientMessage, Error, Result};

use crate::builder::SessionBuilder;
use crate::call::{CallRegistry, MethodCall};
use crate::collection::{CollectionDirectory, CollectionHandler};
use crate::dispatch::Dispatcher;
use crate::heartbeat::Heartbeat;
use crate::ids::IdMinter;
use crate::metrics::SessionMetrics;
use crate::ping::PingRegistry;
use crate::reconnect::ReconnectionStrategy;
use crate::state::{SessionState, SharedState};
use crate::sub::{SubRegistry, Subscription};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WsStream, Message>;
pub(crate) type WsSource = SplitStream<WsStream>;

/// Inbox capacity. A full inbox backpressures the transport reader
/// instead of buffering without bound.
const INBOX_CAPACITY: usize = 100;
const ERROR_CAPACITY: usize = 100;

/// A live protocol session over one WebSocket transport.
#[derive(Clone)]
pub struct Session {
    pub(crate) sender: Arc<Mutex<Option<WsSink>>>,
    pub(crate) shared: SharedState,
    pub(crate) ids: IdMinter,
    pub(crate) pings: PingRegistry,
    pub(crate) calls: CallRegistry,
    pub(crate) subs: SubRegistry,
    pub(crate) collections: CollectionDirectory,
    pub(crate) heartbeat: Heartbeat,
    pub(crate) metrics: Option<Arc<SessionMetrics>>,
    inbox_tx: mpsc::Sender<Value>,
    error_tx: mpsc::Sender<Error>,
    shutdown: Arc<Notify>,
    reconnect_gate: Arc<Mutex<()>>,
    strategy: Arc<Mutex<Box<dyn ReconnectionStrategy>>>,
    reconnects: Arc<AtomicU64>,
    heartbeat_timeout: Duration,
    url: String,
    origin: Option<String>,
}

impl Session {
    /// Connect with default configuration. See [`SessionBuilder`] for
    /// heartbeat, reconnection, and metrics options.
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        SessionBuilder::new(url).connect().await
    }

    pub(crate) async fn establish(builder: SessionBuilder) -> Result<Self> {
        let SessionBuilder {
            url,
            origin,
            heartbeat_interval,
            heartbeat_timeout,
            strategy,
            metrics,
        } = builder;

        tracing::info!(url = %url, "dialing");
        let stream = dial(&url, origin.as_deref()).await?;
        let (sink, source) = stream.split();

        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(ERROR_CAPACITY);

        let session = Session {
            sender: Arc::new(Mutex::new(Some(sink))),
            shared: SharedState::new(),
            ids: IdMinter::new(),
            pings: PingRegistry::new(),
            calls: CallRegistry::new(),
            subs: SubRegistry::new(),
            collections: CollectionDirectory::new(),
            heartbeat: Heartbeat::new(heartbeat_interval),
            metrics,
            inbox_tx,
            error_tx,
            shutdown: Arc::new(Notify::new()),
            reconnect_gate: Arc::new(Mutex::new(())),
            strategy: Arc::new(Mutex::new(strategy)),
            reconnects: Arc::new(AtomicU64::new(0)),
            heartbeat_timeout,
            url,
            origin,
        };

        // Exactly one dispatcher per session, for the session's lifetime.
        tokio::spawn(Dispatcher::new(session.clone(), inbox_rx, error_rx).run());

        session.spawn_worker(source);
        session.shared.set_state(SessionState::Negotiating).await;
        session.send(&ClientMessage::connect()).await?;
        tracing::info!(url = %session.url, "transport up, negotiating");
        Ok(session)
    }

    /// Invoke a method and wait for its result.
    ///
    /// If the transport drops before the result arrives, the invocation is
    /// retransmitted on resume with the same id; the method must tolerate
    /// that.
    #[tracing::instrument(skip(self, args))]
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        let start = std::time::Instant::now();
        let outcome = self.invoke(method, args).await.wait().await;
        if let Some(metrics) = &self.metrics {
            let status = if outcome.is_ok() { "ok" } else { "error" };
            metrics.record_call(method, status, start.elapsed().as_secs_f64());
        }
        outcome
    }

    /// Invoke a method asynchronously. The returned handle resolves when
    /// the matching `result` message arrives.
    pub async fn invoke(&self, method: &str, args: Vec<Value>) -> MethodCall {
        let id = self.ids.mint();
        let done = self.calls.register(&id, method, &args).await;
        let message = ClientMessage::method(id.clone(), method, args);
        if let Err(err) = self.send(&message).await {
            if self.is_closed().await {
                self.calls.complete(&id, Err(err)).await;
            } else {
                // Transport is down; the registered call rides along with
                // the resume replay.
                tracing::debug!(method, id = %id, "send failed, call queued for resume");
            }
        }
        MethodCall::new(id, method, done)
    }

    /// Subscribe to a named stream and wait for the initial snapshot.
    #[tracing::instrument(skip(self, args))]
    pub async fn sub(&self, name: &str, args: Vec<Value>) -> Result<()> {
        self.subscribe(name, args).await.ready().await
    }

    /// Subscribe asynchronously. The returned handle resolves when the
    /// server marks the subscription ready, or errors on `nosub`.
    pub async fn subscribe(&self, name: &str, args: Vec<Value>) -> Subscription {
        let id = self.ids.mint();
        let ready = self.subs.register(&id, name, &args).await;
        let message = ClientMessage::sub(id.clone(), name, args);
        if let Err(err) = self.send(&message).await {
            if self.is_closed().await {
                self.subs.mark_failed(&id, err).await;
            } else {
                tracing::debug!(name, id = %id, "send failed, subscription queued for resume");
            }
        }
        Subscription::new(id, name, ready)
    }

    /// Cancel a subscription by the id of its [`Subscription`] handle.
    pub async fn unsubscribe(&self, id: &str) -> Result<()> {
        if !self.subs.remove(id).await {
            return Err(Error::Internal(format!("unknown subscription id {id}")));
        }
        self.send(&ClientMessage::unsub(id)).await
    }

    /// Fire-and-forget liveness probe. If the pong does not arrive within
    /// the heartbeat timeout, the session reconnects.
    pub async fn ping(&self) {
        let id = self.ids.mint();
        let session = self.clone();
        let metrics = self.metrics.clone();
        self.ping_pong(&id, self.heartbeat_timeout, move |err| {
            if err.is_some() {
                tracing::warn!("ping went unanswered, reconnecting");
                if let Some(metrics) = &metrics {
                    metrics.record_ping_timeout();
                }
                tokio::spawn(async move { session.reconnect().await });
            }
        })
        .await;
    }

    /// Send a liveness probe with a caller-chosen id and handler. The
    /// handler fires exactly once: with `None` when the pong arrives, or
    /// with the error when the probe cannot be sent or times out. The
    /// empty id is valid; anonymous probes share a FIFO bucket.
    pub async fn ping_pong<F>(&self, id: &str, timeout: Duration, handler: F)
    where
        F: FnOnce(Option<Error>) + Send + 'static,
    {
        if let Some(metrics) = &self.metrics {
            metrics.record_ping();
        }
        let wire_id = if id.is_empty() {
            None
        } else {
            Some(id.to_string())
        };
        if let Err(err) = self.send(&ClientMessage::ping(wire_id)).await {
            handler(Some(err));
            return;
        }
        self.pings.enroll(id, timeout, Box::new(handler)).await;
    }

    /// Close the session. Idempotent. Outstanding calls and not-yet-ready
    /// subscriptions complete with [`Error::ConnectionClosed`] so no
    /// caller is left waiting forever.
    #[tracing::instrument(skip(self))]
    pub async fn close(&self) {
        if self.shared.is_closed().await {
            return;
        }
        self.shared.set_state(SessionState::Closed).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_connection_state(SessionState::Closed.code());
        }
        self.shutdown.notify_one();
        self.teardown_transport().await;
        // shutdown, not timeout: trackers are discarded without firing
        self.pings.clear().await;
        self.calls.fail_all(Error::ConnectionClosed).await;
        self.subs.fail_all(Error::ConnectionClosed).await;
        tracing::info!(url = %self.url, "session closed");
    }

    /// Attach a handler for a named collection. Handlers receive the
    /// data-delta events addressed to that collection and live until the
    /// session closes.
    pub async fn register_collection(&self, name: &str, handler: Arc<dyn CollectionHandler>) {
        self.collections.register(name, handler).await;
    }

    /// The session token issued at negotiation, used for resume.
    pub async fn session_token(&self) -> Option<String> {
        self.shared.session_token().await
    }

    /// The negotiated protocol version.
    pub async fn version(&self) -> Option<String> {
        self.shared.version().await
    }

    /// The server cluster id, if the server announced one.
    pub async fn server_id(&self) -> Option<String> {
        self.shared.server_id().await
    }

    pub async fn state(&self) -> SessionState {
        self.shared.state().await
    }

    pub async fn is_closed(&self) -> bool {
        self.shared.is_closed().await
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Number of reconnect dial attempts made so far.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub fn reset_stats(&self) {
        self.reconnects.store(0, Ordering::Relaxed);
    }

    /// Method invocations currently awaiting a result.
    pub async fn pending_call_count(&self) -> usize {
        self.calls.len().await
    }

    /// Subscriptions currently registered (waiting or live).
    pub async fn active_sub_count(&self) -> usize {
        self.subs.len().await
    }

    pub(crate) fn shutdown_signal(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Serialize and transmit one message. Sends from concurrent tasks are
    /// serialized by the sink mutex, keeping frames atomic.
    pub(crate) async fn send(&self, message: &ClientMessage) -> Result<()> {
        let text = codec::encode(message)?;
        tracing::debug!(message = %text, "send");
        let mut sender = self.sender.lock().await;
        match sender.as_mut() {
            Some(sink) => sink
                .send(Message::Text(text))
                .await
                .map_err(|e| Error::WebSocket(e.to_string())),
            None => Err(Error::ConnectionClosed),
        }
    }

    pub(crate) fn spawn_worker(&self, source: WsSource) {
        let session = self.clone();
        tokio::spawn(async move { session.inbound_worker(source).await });
    }

    /// Reads frames from one transport until it dies, feeding the inbox.
    /// There is at most one worker per transport.
    async fn inbound_worker(self, mut source: WsSource) {
        tracing::debug!(url = %self.url, reconnects = self.reconnects(), "inbound worker started");
        while let Some(frame) = source.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    // any inbound traffic counts as liveness
                    self.heartbeat.touch().await;
                    match codec::decode(&text) {
                        Ok(Value::Object(object)) => {
                            // blocking send: backpressure the transport
                            // rather than buffer without bound
                            if self.inbox_tx.send(Value::Object(object)).await.is_err() {
                                break;
                            }
                        }
                        Ok(Value::Null) => {
                            tracing::warn!("null frame from transport, dropping");
                        }
                        Ok(other) => {
                            tracing::warn!(frame = %other, "non-object frame from transport, dropping");
                        }
                        Err(err) => {
                            let _ = self.error_tx.send(err).await;
                            break;
                        }
                    }
                }
                // orderly end of stream: exit silently
                Ok(Message::Close(_)) => break,
                // transport-level ping/pong/binary still prove liveness
                Ok(_) => self.heartbeat.touch().await,
                Err(err) => {
                    let _ = self.error_tx.send(Error::WebSocket(err.to_string())).await;
                    break;
                }
            }
        }

        self.teardown_transport().await;
        if !self.is_closed().await {
            let session = self.clone();
            tokio::spawn(async move { session.reconnect().await });
        }
        tracing::debug!(url = %self.url, "inbound worker exited");
    }

    /// Stop the heartbeat and close the transport. Idempotent; shared by
    /// close, reconnect, and worker exit. In-flight ping trackers are left
    /// alone: transport loss is not shutdown, and each tracker resolves
    /// through its own pong or its own deadline.
    pub(crate) async fn teardown_transport(&self) {
        self.heartbeat.stop().await;
        let sink = self.sender.lock().await.take();
        if let Some(mut sink) = sink {
            let _ = sink.close().await;
        }
    }

    /// Tear down the dead transport and establish a fresh one, resuming
    /// the session on it. Only one reconnect sequence runs at a time;
    /// concurrent triggers return immediately.
    pub(crate) async fn reconnect(&self) {
        let Ok(_gate) = self.reconnect_gate.try_lock() else {
            tracing::debug!("reconnect already in flight");
            return;
        };
        if self.is_closed().await {
            return;
        }

        self.shared.set_state(SessionState::Reconnecting).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_connection_state(SessionState::Reconnecting.code());
        }
        self.teardown_transport().await;

        let stream = loop {
            let delay = self.strategy.lock().await.next_delay();
            let Some(delay) = delay else {
                tracing::error!(url = %self.url, "reconnect attempts exhausted, giving up");
                self.close().await;
                return;
            };
            tokio::time::sleep(delay).await;
            if self.is_closed().await {
                return;
            }
            self.reconnects.fetch_add(1, Ordering::Relaxed);
            if let Some(metrics) = &self.metrics {
                metrics.record_reconnect_attempt();
            }
            match dial(&self.url, self.origin.as_deref()).await {
                Ok(stream) => break stream,
                Err(err) => {
                    tracing::warn!(url = %self.url, error = %err, "redial failed");
                }
            }
        };

        // a close that landed while the dial was in flight wins; do not
        // resurrect the session around it
        if self.is_closed().await {
            return;
        }

        tracing::info!(
            url = %self.url,
            reconnects = self.reconnects(),
            "transport re-established, resuming session"
        );
        self.strategy.lock().await.reset();
        if let Some(metrics) = &self.metrics {
            metrics.record_reconnect_success();
        }

        let (sink, source) = stream.split();
        *self.sender.lock().await = Some(sink);
        self.shared.set_state(SessionState::Negotiating).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_connection_state(SessionState::Negotiating.code());
        }

        // Resume without waiting for the server's acknowledgement;
        // messages pipeline on the new transport. Send failures here mean
        // the fresh transport already died; the worker spawned below will
        // notice and trigger the next round.
        let connect = match self.shared.session_token().await {
            Some(token) => ClientMessage::resume(token),
            None => ClientMessage::connect(),
        };
        if let Err(err) = self.send(&connect).await {
            tracing::warn!(error = %err, "resume negotiation send failed");
        }
        for (id, method, args) in self.calls.pending().await {
            tracing::info!(method = %method, id = %id, "retransmitting in-flight method");
            let _ = self.send(&ClientMessage::method(id, &method, args)).await;
        }
        for (id, name, args) in self.subs.pending().await {
            tracing::info!(name = %name, id = %id, "restarting active subscription");
            let _ = self.send(&ClientMessage::sub(id, &name, args)).await;
        }
        // Local replicas are now stale; drop them and let the resumed
        // subscriptions repopulate.
        self.collections.reset_all().await;

        self.spawn_worker(source);
    }
}

async fn dial(url: &str, origin: Option<&str>) -> Result<WsStream> {
    let mut request = url
        .into_client_request()
        .map_err(|e| Error::WebSocket(e.to_string()))?;
    if let Some(origin) = origin {
        let value: HeaderValue = origin
            .parse()
            .map_err(|_| Error::WebSocket(format!("invalid origin: {origin}")))?;
        request.headers_mut().insert("Origin", value);
    }
    let (stream, _) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocket(e.to_string()))?;
    Ok(stream)
}
