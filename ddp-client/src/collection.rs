//! Collection event routing
//!
//! The server pushes data-delta messages addressed to named collections.
//! Callers register a [`CollectionHandler`] per collection; the dispatcher
//! routes each delta to the matching handler. Deltas for collections
//! nobody registered go to a shared no-op sink: dropped events are
//! tolerated by design of the protocol.
//!
//! Handlers live until the session closes. On resume the engine calls
//! `reset` on every handler so local replicas can discard state ahead of
//! the server resending it on the replayed subscriptions.

use ddp_core::DataEvent;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Receives data-delta events for one named collection.
///
/// All methods default to no-ops so implementations only override the
/// deltas they care about. Handlers run on the dispatcher task and must
/// not block.
pub trait CollectionHandler: Send + Sync {
    fn added(&self, _event: &DataEvent) {}
    fn changed(&self, _event: &DataEvent) {}
    fn removed(&self, _event: &DataEvent) {}
    fn added_before(&self, _event: &DataEvent) {}
    fn moved_before(&self, _event: &DataEvent) {}

    /// Discard local state. Called during resume, before the server
    /// resends the collection contents.
    fn reset(&self) {}
}

/// Sink for deltas addressed to collections nobody registered.
struct NullCollection;

impl CollectionHandler for NullCollection {}

/// Maps collection names to their handlers.
#[derive(Clone)]
pub(crate) struct CollectionDirectory {
    handlers: Arc<Mutex<HashMap<String, Arc<dyn CollectionHandler>>>>,
    null: Arc<dyn CollectionHandler>,
}

impl CollectionDirectory {
    pub(crate) fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(HashMap::new())),
            null: Arc::new(NullCollection),
        }
    }

    pub(crate) async fn register(&self, name: &str, handler: Arc<dyn CollectionHandler>) {
        self.handlers
            .lock()
            .await
            .insert(name.to_string(), handler);
    }

    /// Look up the handler for a delta. Missing or unnamed collections get
    /// the shared no-op sink.
    pub(crate) async fn get(&self, name: Option<&str>) -> Arc<dyn CollectionHandler> {
        if let Some(name) = name {
            if let Some(handler) = self.handlers.lock().await.get(name) {
                return handler.clone();
            }
        }
        self.null.clone()
    }

    /// Reset every registered handler, in anticipation of a resend.
    pub(crate) async fn reset_all(&self) {
        for handler in self.handlers.lock().await.values() {
            handler.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingCollection {
        added: AtomicUsize,
        resets: AtomicUsize,
    }

    impl CollectionHandler for CountingCollection {
        fn added(&self, _event: &DataEvent) {
            self.added.fetch_add(1, Ordering::SeqCst);
        }

        fn reset(&self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn registered_handlers_receive_events() {
        let directory = CollectionDirectory::new();
        let counter = Arc::new(CountingCollection::default());
        directory.register("tasks", counter.clone()).await;

        directory.get(Some("tasks")).await.added(&DataEvent::default());
        assert_eq!(counter.added.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn lookup_miss_yields_a_tolerant_sink() {
        let directory = CollectionDirectory::new();
        // neither call may panic, and nothing is implicitly created
        directory.get(Some("ghost")).await.added(&DataEvent::default());
        directory.get(None).await.removed(&DataEvent::default());
    }

    #[tokio::test]
    async fn reset_all_touches_every_handler() {
        let directory = CollectionDirectory::new();
        let a = Arc::new(CountingCollection::default());
        let b = Arc::new(CountingCollection::default());
        directory.register("a", a.clone()).await;
        directory.register("b", b.clone()).await;

        directory.reset_all().await;
        assert_eq!(a.resets.load(Ordering::SeqCst), 1);
        assert_eq!(b.resets.load(Ordering::SeqCst), 1);
    }
}
