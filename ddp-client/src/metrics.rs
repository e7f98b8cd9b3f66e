//! Session metrics
//!
//! Optional OpenTelemetry instruments for monitoring session health.
//! Instruments are created on the process-global meter and recorded by the
//! engine when a `SessionMetrics` is attached via
//! [`SessionBuilder::metrics`](crate::SessionBuilder::metrics).

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Instruments for one session (or a family of sessions sharing a name).
pub struct SessionMetrics {
    /// Lifecycle state (0=dialing, 1=negotiating, 2=live, 3=reconnecting, 4=closed)
    pub connection_state: Gauge<i64>,
    /// Method invocations, labelled by method and outcome
    pub calls_total: Counter<u64>,
    /// Method round-trip latency in seconds
    pub call_duration: Histogram<f64>,
    /// Liveness probes sent
    pub pings_sent: Counter<u64>,
    /// Liveness probes that timed out
    pub ping_timeouts: Counter<u64>,
    /// Reconnect dial attempts
    pub reconnect_attempts: Counter<u64>,
    /// Reconnects that re-established a transport
    pub reconnect_success: Counter<u64>,
    /// Data-delta messages routed to collections, labelled by kind
    pub data_events: Counter<u64>,
}

impl SessionMetrics {
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        Self::with_meter(&global::meter(name))
    }

    pub fn with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("ddp.session.connection.state")
                .with_description(
                    "Lifecycle state (0=dialing, 1=negotiating, 2=live, 3=reconnecting, 4=closed)",
                )
                .build(),
            calls_total: meter
                .u64_counter("ddp.session.calls.total")
                .with_description("Method invocations")
                .build(),
            call_duration: meter
                .f64_histogram("ddp.session.call.duration")
                .with_description("Method round-trip latency in seconds")
                .build(),
            pings_sent: meter
                .u64_counter("ddp.session.pings.sent")
                .with_description("Liveness probes sent")
                .build(),
            ping_timeouts: meter
                .u64_counter("ddp.session.pings.timeouts")
                .with_description("Liveness probes that went unanswered")
                .build(),
            reconnect_attempts: meter
                .u64_counter("ddp.session.reconnect.attempts")
                .with_description("Reconnect dial attempts")
                .build(),
            reconnect_success: meter
                .u64_counter("ddp.session.reconnect.success")
                .with_description("Reconnects that re-established a transport")
                .build(),
            data_events: meter
                .u64_counter("ddp.session.data.events")
                .with_description("Data-delta messages routed to collections")
                .build(),
        }
    }

    pub fn record_connection_state(&self, state: i64) {
        self.connection_state.record(state, &[]);
    }

    pub fn record_call(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.calls_total.add(1, attributes);
        self.call_duration.record(duration_secs, attributes);
    }

    pub fn record_ping(&self) {
        self.pings_sent.add(1, &[]);
    }

    pub fn record_ping_timeout(&self) {
        self.ping_timeouts.add(1, &[]);
    }

    pub fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.add(1, &[]);
    }

    pub fn record_reconnect_success(&self) {
        self.reconnect_success.add(1, &[]);
    }

    pub fn record_data_event(&self, kind: &str) {
        self.data_events
            .add(1, &[KeyValue::new("kind", kind.to_string())]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_against_the_noop_meter_does_not_panic() {
        let metrics = SessionMetrics::new("ddp-test");
        metrics.record_connection_state(2);
        metrics.record_call("echo", "ok", 0.01);
        metrics.record_ping();
        metrics.record_ping_timeout();
        metrics.record_reconnect_attempt();
        metrics.record_reconnect_success();
        metrics.record_data_event("added");
    }
}
