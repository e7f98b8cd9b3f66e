//! Outstanding method invocations
//!
//! Each in-flight method call gets a dedicated oneshot channel. The
//! dispatcher completes the call when the matching `result` message
//! arrives; completion removes the entry first, so a retransmitted result
//! for the same id after a reconnect is a harmless no-op.
//!
//! The registry also keeps each call's method name and arguments so the
//! reconnect sequence can retransmit everything still in flight with the
//! original ids.

use ddp_core::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

/// Handle for an asynchronous method invocation.
///
/// Returned by [`Session::invoke`](crate::Session::invoke); await the
/// outcome with [`wait`](MethodCall::wait).
pub struct MethodCall {
    id: String,
    method: String,
    done: oneshot::Receiver<Result<Value>>,
}

impl MethodCall {
    pub(crate) fn new(id: String, method: &str, done: oneshot::Receiver<Result<Value>>) -> Self {
        Self {
            id,
            method: method.to_string(),
            done,
        }
    }

    /// The wire id of this invocation.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The method name being invoked.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Wait for the server's result.
    pub async fn wait(self) -> Result<Value> {
        match self.done.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::ConnectionClosed),
        }
    }
}

struct PendingCall {
    method: String,
    args: Vec<Value>,
    tx: oneshot::Sender<Result<Value>>,
}

/// Tracks method invocations awaiting a `result` message.
#[derive(Clone)]
pub(crate) struct CallRegistry {
    pending: Arc<Mutex<HashMap<String, PendingCall>>>,
}

impl CallRegistry {
    pub(crate) fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) async fn register(
        &self,
        id: &str,
        method: &str,
        args: &[Value],
    ) -> oneshot::Receiver<Result<Value>> {
        let (tx, rx) = oneshot::channel();
        let call = PendingCall {
            method: method.to_string(),
            args: args.to_vec(),
            tx,
        };
        self.pending.lock().await.insert(id.to_string(), call);
        rx
    }

    /// Complete and remove a call. Unknown ids are ignored; a duplicate
    /// result after resume must not crash or double-signal.
    pub(crate) async fn complete(&self, id: &str, outcome: Result<Value>) {
        if let Some(call) = self.pending.lock().await.remove(id) {
            let _ = call.tx.send(outcome);
        }
    }

    /// Fail every pending call with the same error.
    pub(crate) async fn fail_all(&self, error: Error) {
        let mut pending = self.pending.lock().await;
        for (_, call) in pending.drain() {
            let _ = call.tx.send(Err(error.clone()));
        }
    }

    /// Snapshot of everything still in flight, for resume replay.
    pub(crate) async fn pending(&self) -> Vec<(String, String, Vec<Value>)> {
        self.pending
            .lock()
            .await
            .iter()
            .map(|(id, call)| (id.clone(), call.method.clone(), call.args.clone()))
            .collect()
    }

    pub(crate) async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }
}
