//! Reconnection delay policies
//!
//! When the transport dies, the reconnect controller asks its strategy how
//! long to wait before the next dial, repeatedly, until the dial succeeds
//! or the strategy gives up.
//!
//! The protocol's contract is a fixed interval between attempts, so
//! [`FixedDelay`] at [`DEFAULT_RECONNECT_INTERVAL`] is the default.
//! [`ExponentialBackoff`] is available for deployments that prefer not to
//! hammer a server that is down, and [`NoReconnect`] turns the feature off
//! entirely.

use std::time::Duration;

/// Default delay between reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Decides the delay before each reconnect attempt.
///
/// Strategies are stateful: they count attempts internally and are `reset`
/// after a successful reconnection so the next outage starts fresh.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before the next attempt, or `None` to give up.
    fn next_delay(&mut self) -> Option<Duration>;

    /// Forget accumulated state after a successful reconnection.
    fn reset(&mut self);
}

/// Constant delay between attempts. The protocol default.
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
    attempt: u32,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
            attempt: 0,
        }
    }

    /// Give up after this many attempts. Unlimited by default.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_INTERVAL)
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }
        self.attempt += 1;
        Some(self.delay)
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Exponentially growing delay with an optional jitter, capped at a
/// maximum.
pub struct ExponentialBackoff {
    min_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    jitter: bool,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
            max_attempts: None,
            jitter: false,
            attempt: 0,
        }
    }

    /// Give up after this many attempts. Unlimited by default.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Add up to 25% random jitter to each delay, spreading out herds of
    /// clients reconnecting to the same server.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }
        let doubled = self
            .min_delay
            .as_millis()
            .saturating_mul(1u128 << self.attempt.min(32));
        let mut millis = doubled.min(self.max_delay.as_millis()) as u64;
        if self.jitter {
            use rand::Rng;
            millis += rand::thread_rng().gen_range(0..=millis / 4);
        }
        self.attempt += 1;
        Some(Duration::from_millis(millis))
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Never reconnect; the first outage is terminal.
pub struct NoReconnect;

impl ReconnectionStrategy for NoReconnect {
    fn next_delay(&mut self) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}
}
