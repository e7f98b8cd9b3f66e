//! In-flight liveness probes
//!
//! Pings are tracked in FIFO buckets keyed by id. The empty string is a
//! legitimate bucket: anonymous pings queue there and their pongs resolve
//! them in enrollment order. Each tracker owns a timeout task; whichever of
//! pong and timeout wins removes the tracker under the registry lock, so a
//! handler fires exactly once with either success or a timeout, never both.
//!
//! `clear` is shutdown, not timeout: trackers are discarded without
//! invoking their handlers.

use ddp_core::Error;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Single-shot callback for one probe. Receives `None` on pong and
/// `Some(Error::PingTimeout)` when the deadline passes first.
pub type PingHandler = Box<dyn FnOnce(Option<Error>) + Send + 'static>;

struct PingTracker {
    seq: u64,
    handler: PingHandler,
    timer: JoinHandle<()>,
}

struct Buckets {
    trackers: HashMap<String, VecDeque<PingTracker>>,
    next_seq: u64,
}

/// Tracks outstanding pings and their per-probe deadlines.
#[derive(Clone)]
pub(crate) struct PingRegistry {
    inner: Arc<Mutex<Buckets>>,
}

impl PingRegistry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Buckets {
                trackers: HashMap::new(),
                next_seq: 0,
            })),
        }
    }

    /// Enroll a probe and arm its timeout.
    pub(crate) async fn enroll(&self, id: &str, timeout: Duration, handler: PingHandler) {
        let mut inner = self.inner.lock().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let registry = self.clone();
        let key = id.to_string();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            registry.expire(&key, seq).await;
        });

        inner
            .trackers
            .entry(id.to_string())
            .or_default()
            .push_back(PingTracker { seq, handler, timer });
    }

    /// Resolve the oldest probe in the bucket. A pong nobody is waiting
    /// for is discarded silently; that is conformant behavior, not an
    /// error.
    pub(crate) async fn resolve(&self, id: &str) {
        let resolved = {
            let mut inner = self.inner.lock().await;
            let popped = inner.trackers.get_mut(id).and_then(VecDeque::pop_front);
            if inner.trackers.get(id).map(VecDeque::is_empty).unwrap_or(false) {
                inner.trackers.remove(id);
            }
            popped
        };
        if let Some(tracker) = resolved {
            tracker.timer.abort();
            (tracker.handler)(None);
        }
    }

    /// Discard every tracker without invoking handlers.
    pub(crate) async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        for (_, bucket) in inner.trackers.drain() {
            for tracker in bucket {
                tracker.timer.abort();
            }
        }
    }

    pub(crate) async fn tracked(&self) -> usize {
        self.inner.lock().await.trackers.values().map(VecDeque::len).sum()
    }

    async fn expire(&self, id: &str, seq: u64) {
        let expired = {
            let mut inner = self.inner.lock().await;
            let mut expired = None;
            if let Some(bucket) = inner.trackers.get_mut(id) {
                if let Some(pos) = bucket.iter().position(|t| t.seq == seq) {
                    expired = bucket.remove(pos);
                }
            }
            if inner.trackers.get(id).map(VecDeque::is_empty).unwrap_or(false) {
                inner.trackers.remove(id);
            }
            expired
        };
        if let Some(tracker) = expired {
            (tracker.handler)(Some(Error::PingTimeout));
        }
    }
}
