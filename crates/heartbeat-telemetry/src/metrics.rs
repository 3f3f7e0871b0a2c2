//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::TelemetryError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render the `/metrics` endpoint. Metrics
/// recorded before installation are dropped.
pub fn install_recorder() -> Result<PrometheusHandle, TelemetryError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::Recorder(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

// Metric name constants to avoid typos across crates.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Registered sessions (gauge).
pub const SESSIONS_REGISTERED: &str = "sessions_registered";
/// Control commands processed (counter, labels: cmd_type).
pub const COMMANDS_TOTAL: &str = "commands_total";
/// Control commands rejected (counter).
pub const COMMAND_ERRORS_TOTAL: &str = "command_errors_total";
/// Diagnostic messages received (counter).
pub const DIAGNOSTIC_MESSAGES_TOTAL: &str = "diagnostic_messages_total";
/// Diagnostic messages rejected from unregistered clients (counter).
pub const DIAGNOSTIC_REJECTIONS_TOTAL: &str = "diagnostic_rejections_total";
/// Reachability probe failures (counter, labels: kind).
pub const PROBE_FAILURES_TOTAL: &str = "probe_failures_total";
/// Heartbeats delivered to the middleware (counter).
pub const HEARTBEAT_PUSHES_TOTAL: &str = "heartbeat_pushes_total";
/// Heartbeat deliveries that failed (counter, labels: kind).
pub const HEARTBEAT_PUSH_FAILURES_TOTAL: &str = "heartbeat_push_failures_total";
/// Heartbeat ticks skipped because metrics were unavailable (counter).
pub const HEARTBEAT_METRICS_FAILURES_TOTAL: &str = "heartbeat_metrics_failures_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = handle.render();
        assert!(output.is_empty() || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            SESSIONS_REGISTERED,
            COMMANDS_TOTAL,
            COMMAND_ERRORS_TOTAL,
            DIAGNOSTIC_MESSAGES_TOTAL,
            DIAGNOSTIC_REJECTIONS_TOTAL,
            PROBE_FAILURES_TOTAL,
            HEARTBEAT_PUSHES_TOTAL,
            HEARTBEAT_PUSH_FAILURES_TOTAL,
            HEARTBEAT_METRICS_FAILURES_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
