//! Identifier minting
//!
//! Every call, subscription, and ping carries an opaque id minted here.
//! Ids are unique for the lifetime of a session and never reused; the rest
//! of the engine treats them as opaque strings.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Mints session-unique identifiers from a shared monotonic counter.
#[derive(Clone, Debug)]
pub(crate) struct IdMinter {
    next: Arc<AtomicU64>,
}

impl IdMinter {
    pub(crate) fn new() -> Self {
        Self {
            next: Arc::new(AtomicU64::new(1)),
        }
    }

    pub(crate) fn mint(&self) -> String {
        self.next.fetch_add(1, Ordering::Relaxed).to_string()
    }
}
