//! Shared test utilities for ddp-client integration tests
//!
//! Provides a scripted mock WebSocket server plus helpers for building
//! wire messages, so client behavior can be exercised without a real
//! server.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use ddp_client::{Session, SessionState};
use serde_json::{json, Value};

/// Mock WebSocket server driven by a message handler.
///
/// The handler receives each inbound text frame and returns the frames to
/// send back, so tests can script arbitrary server behavior. Every
/// inbound frame is also captured for assertions.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    message_rx: mpsc::Receiver<String>,
}

impl MockWsServer {
    /// Server that completes the session handshake and answers pings.
    pub async fn new() -> Self {
        Self::with_handler(default_handler).await
    }

    /// Server with scripted responses.
    pub async fn with_handler<F, Fut>(handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Vec<String>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (message_tx, message_rx) = mpsc::channel::<String>(100);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { break };
                        let handler = handler.clone();
                        let message_tx = message_tx.clone();
                        tokio::spawn(async move {
                            let Ok(ws) = accept_async(stream).await else { return };
                            let (mut write, mut read) = ws.split();
                            while let Some(Ok(frame)) = read.next().await {
                                if let Message::Text(text) = frame {
                                    let _ = message_tx.send(text.clone()).await;
                                    for reply in handler(text).await {
                                        if write.send(Message::Text(reply)).await.is_err() {
                                            return;
                                        }
                                    }
                                }
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            message_rx,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Next frame the server received, or None after five seconds.
    pub async fn wait_for_message(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), self.message_rx.recv())
            .await
            .ok()
            .flatten()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Handshake-and-heartbeat behavior shared by most tests.
pub async fn default_handler(msg: String) -> Vec<String> {
    let Ok(value) = serde_json::from_str::<Value>(&msg) else {
        return vec![];
    };
    match value["msg"].as_str() {
        Some("connect") => vec![connected("the-session")],
        Some("ping") => vec![pong(value["id"].as_str())],
        _ => vec![],
    }
}

pub fn connected(session: &str) -> String {
    json!({"msg": "connected", "session": session}).to_string()
}

pub fn result_ok(id: &str, result: Value) -> String {
    json!({"msg": "result", "id": id, "result": result}).to_string()
}

pub fn result_err(id: &str, error: &str) -> String {
    json!({"msg": "result", "id": id, "error": error}).to_string()
}

pub fn ready(subs: &[&str]) -> String {
    json!({"msg": "ready", "subs": subs}).to_string()
}

pub fn nosub(id: &str, error: &str) -> String {
    json!({"msg": "nosub", "id": id, "error": error}).to_string()
}

pub fn added(collection: &str, id: &str, fields: Value) -> String {
    json!({"msg": "added", "collection": collection, "id": id, "fields": fields}).to_string()
}

pub fn pong(id: Option<&str>) -> String {
    match id {
        Some(id) => json!({"msg": "pong", "id": id}).to_string(),
        None => json!({"msg": "pong"}).to_string(),
    }
}

/// Poll until the session finishes negotiating.
pub async fn wait_until_live(session: &Session) {
    for _ in 0..250 {
        if session.state().await == SessionState::Live {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("session never became live");
}

/// Poll an async condition with a deadline.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..250 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {what}");
}
