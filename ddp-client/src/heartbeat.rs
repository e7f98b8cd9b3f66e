//! Heartbeat timer
//!
//! Detects silently dead transports. The driver is a single task that
//! sleeps for the heartbeat interval; any inbound frame (and any heartbeat
//! we send) resets the sleep via a `Touch` pulse, so the ping only fires
//! after a full interval of silence. The ping enrolls a tracker whose
//! timeout triggers a reconnect, off the dispatcher task.
//!
//! The driver starts when the server acknowledges the session and stops on
//! transport teardown. Starting again replaces any previous driver.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

use crate::session::Session;

enum Pulse {
    Touch,
}

/// Handle to the heartbeat driver task.
#[derive(Clone)]
pub(crate) struct Heartbeat {
    interval: Duration,
    pulse: Arc<Mutex<Option<mpsc::UnboundedSender<Pulse>>>>,
}

impl Heartbeat {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            pulse: Arc::new(Mutex::new(None)),
        }
    }

    /// Start (or restart) the driver. The previous driver, if any, sees
    /// its pulse channel close and exits.
    pub(crate) async fn start(&self, session: Session) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        *self.pulse.lock().await = Some(tx);

        let interval = self.interval;
        tokio::spawn(async move {
            tracing::debug!(interval = ?interval, "heartbeat started");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        // a full interval of silence: probe the server
                        session.ping().await;
                    }
                    pulse = rx.recv() => match pulse {
                        Some(Pulse::Touch) => {}
                        None => break,
                    },
                }
            }
            tracing::debug!("heartbeat stopped");
        });
    }

    /// Note traffic on the transport, pushing the next probe out by a full
    /// interval.
    pub(crate) async fn touch(&self) {
        if let Some(tx) = self.pulse.lock().await.as_ref() {
            let _ = tx.send(Pulse::Touch);
        }
    }

    /// Stop the driver. Safe to call when it was never started.
    pub(crate) async fn stop(&self) {
        self.pulse.lock().await.take();
    }

    #[cfg(test)]
    pub(crate) async fn is_running(&self) -> bool {
        self.pulse.lock().await.is_some()
    }
}
