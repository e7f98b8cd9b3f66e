//! Active subscriptions
//!
//! A subscription stays registered from the moment it is requested until
//! the server refuses it (`nosub`) or the caller cancels it. The one-shot
//! ready sink fires when the initial snapshot lands (`ready`) or when the
//! subscription fails; after that the entry remains, because it must be
//! replayed on resume for as long as the feed is live.

use ddp_core::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

/// Handle for a subscription request.
///
/// Returned by [`Session::subscribe`](crate::Session::subscribe); await the
/// initial snapshot with [`ready`](Subscription::ready). The handle's id is
/// what [`Session::unsubscribe`](crate::Session::unsubscribe) takes.
pub struct Subscription {
    id: String,
    name: String,
    ready: oneshot::Receiver<Result<()>>,
}

impl Subscription {
    pub(crate) fn new(id: String, name: &str, ready: oneshot::Receiver<Result<()>>) -> Self {
        Self {
            id,
            name: name.to_string(),
            ready,
        }
    }

    /// The wire id of this subscription.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The stream name subscribed to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait until the initial snapshot has arrived.
    pub async fn ready(self) -> Result<()> {
        match self.ready.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::ConnectionClosed),
        }
    }
}

struct PendingSub {
    name: String,
    args: Vec<Value>,
    ready: Option<oneshot::Sender<Result<()>>>,
}

/// Tracks subscriptions by id, for ready signalling and resume replay.
#[derive(Clone)]
pub(crate) struct SubRegistry {
    subs: Arc<Mutex<HashMap<String, PendingSub>>>,
}

impl SubRegistry {
    pub(crate) fn new() -> Self {
        Self {
            subs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) async fn register(
        &self,
        id: &str,
        name: &str,
        args: &[Value],
    ) -> oneshot::Receiver<Result<()>> {
        let (tx, rx) = oneshot::channel();
        let sub = PendingSub {
            name: name.to_string(),
            args: args.to_vec(),
            ready: Some(tx),
        };
        self.subs.lock().await.insert(id.to_string(), sub);
        rx
    }

    /// Signal the ready sink. At most once per registration; a second
    /// `ready` for the same id (e.g. after resume) is a no-op.
    pub(crate) async fn mark_ready(&self, id: &str) {
        if let Some(sub) = self.subs.lock().await.get_mut(id) {
            if let Some(tx) = sub.ready.take() {
                let _ = tx.send(Ok(()));
            }
        }
    }

    /// Remove the subscription and surface the error on its ready sink.
    pub(crate) async fn mark_failed(&self, id: &str, error: Error) {
        if let Some(mut sub) = self.subs.lock().await.remove(id) {
            if let Some(tx) = sub.ready.take() {
                let _ = tx.send(Err(error));
            }
        }
    }

    /// Drop a subscription on explicit cancellation. Returns whether the
    /// id was known.
    pub(crate) async fn remove(&self, id: &str) -> bool {
        self.subs.lock().await.remove(id).is_some()
    }

    /// Fail every subscription still waiting on its snapshot and drop all
    /// entries.
    pub(crate) async fn fail_all(&self, error: Error) {
        let mut subs = self.subs.lock().await;
        for (_, mut sub) in subs.drain() {
            if let Some(tx) = sub.ready.take() {
                let _ = tx.send(Err(error.clone()));
            }
        }
    }

    /// Snapshot of every active subscription, for resume replay.
    pub(crate) async fn pending(&self) -> Vec<(String, String, Vec<Value>)> {
        self.subs
            .lock()
            .await
            .iter()
            .map(|(id, sub)| (id.clone(), sub.name.clone(), sub.args.clone()))
            .collect()
    }

    pub(crate) async fn len(&self) -> usize {
        self.subs.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn ready_resolves_and_retains_the_entry() {
        let subs = SubRegistry::new();
        let rx = subs.register("s1", "stream", &[]).await;

        subs.mark_ready("s1").await;
        assert!(rx.await.unwrap().is_ok());
        // still registered: the live feed must survive resume
        assert_eq!(subs.len().await, 1);
    }

    #[tokio::test]
    async fn ready_fires_at_most_once() {
        let subs = SubRegistry::new();
        let rx = subs.register("s1", "stream", &[]).await;

        subs.mark_ready("s1").await;
        subs.mark_ready("s1").await;
        assert!(rx.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn nosub_removes_and_surfaces_the_error() {
        let subs = SubRegistry::new();
        let rx = subs.register("s1", "stream", &[]).await;

        subs.mark_failed("s1", Error::Subscription("denied".into()))
            .await;
        assert_eq!(subs.len().await, 0);
        match rx.await.unwrap() {
            Err(Error::Subscription(reason)) => assert_eq!(reason, "denied"),
            other => panic!("expected subscription error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_ids_are_ignored() {
        let subs = SubRegistry::new();
        subs.mark_ready("ghost").await;
        subs.mark_failed("ghost", Error::ConnectionClosed).await;
        assert!(!subs.remove("ghost").await);
    }

    #[tokio::test]
    async fn pending_snapshots_name_and_args() {
        let subs = SubRegistry::new();
        let _rx = subs.register("s1", "stream", &[json!({"limit": 10})]).await;

        let pending = subs.pending().await;
        assert_eq!(
            pending,
            vec![(
                "s1".to_string(),
                "stream".to_string(),
                vec![json!({"limit": 10})]
            )]
        );
    }

    #[tokio::test]
    async fn fail_all_errors_waiters_and_clears() {
        let subs = SubRegistry::new();
        let rx = subs.register("s1", "stream", &[]).await;
        let _rx2 = subs.register("s2", "other", &[]).await;

        subs.fail_all(Error::ConnectionClosed).await;
        assert_eq!(subs.len().await, 0);
        assert!(rx.await.unwrap().is_err());
    }
}
