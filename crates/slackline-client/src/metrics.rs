//! Metrics collection and export for the client.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const EVENTS_TOTAL: &str = "slackline_events_total";
    pub const COMMANDS_TOTAL: &str = "slackline_commands_total";
    pub const CONNECTION_ERRORS_TOTAL: &str = "slackline_connection_errors_total";
    pub const CONNECT_STEP: &str = "slackline_connect_step";
    pub const SESSIONS_ACTIVE: &str = "slackline_sessions_active";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(names::EVENTS_TOTAL, "Inbound RTM events by type");
    metrics::describe_counter!(names::COMMANDS_TOTAL, "Outbound RTM commands by type");
    metrics::describe_counter!(
        names::CONNECTION_ERRORS_TOTAL,
        "Connection errors reported by the session"
    );
    metrics::describe_gauge!(names::CONNECT_STEP, "Last reached connection step");
    metrics::describe_gauge!(names::SESSIONS_ACTIVE, "Number of running sessions");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record an inbound event.
pub fn record_event(event_type: &str) {
    counter!(names::EVENTS_TOTAL, "type" => event_type.to_string()).increment(1);
}

/// Record an outbound command.
pub fn record_command(command_type: &str) {
    counter!(names::COMMANDS_TOTAL, "type" => command_type.to_string()).increment(1);
}

/// Record a connection error.
pub fn record_connection_error(class: &str) {
    counter!(names::CONNECTION_ERRORS_TOTAL, "class" => class.to_string()).increment(1);
}

/// Record connection progress.
pub fn record_connect_step(step: u32) {
    gauge!(names::CONNECT_STEP).set(f64::from(step));
}

/// Metrics guard that tracks a running session.
pub struct SessionMetricsGuard;

impl SessionMetricsGuard {
    /// Create a new metrics guard, recording a session start.
    #[must_use]
    pub fn new() -> Self {
        gauge!(names::SESSIONS_ACTIVE).increment(1.0);
        Self
    }
}

impl Default for SessionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionMetricsGuard {
    fn drop(&mut self) {
        gauge!(names::SESSIONS_ACTIVE).decrement(1.0);
    }
}
