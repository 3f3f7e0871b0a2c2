//! Diagnostic data relay: answers registered clients with middleware latency.

use std::sync::Arc;
use std::time::Duration;

use heartbeat_core::{ChannelId, ProbeError};
use heartbeat_telemetry::metrics::{
    DIAGNOSTIC_MESSAGES_TOTAL, DIAGNOSTIC_REJECTIONS_TOTAL, PROBE_FAILURES_TOTAL,
};
use metrics::counter;
use serde_json::{Map, Value, json};
use tracing::{error, info, warn};

use crate::probe::{ReachabilityProbe, host_of};
use crate::registry::SessionRegistry;
use crate::transport::{ChannelEvent, ChannelTransport};

/// Error message emitted when an unregistered client sends data.
pub const NON_REGISTERED_CLIENT: &str = "Non-registered client tried to send data";

pub struct DiagnosticHandler {
    registry: Arc<SessionRegistry>,
    transport: Arc<dyn ChannelTransport>,
    probe: Arc<dyn ReachabilityProbe>,
    middleware_address: String,
    timeout: Duration,
}

impl DiagnosticHandler {
    pub fn new(
        registry: Arc<SessionRegistry>,
        transport: Arc<dyn ChannelTransport>,
        probe: Arc<dyn ReachabilityProbe>,
        middleware_address: String,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            probe,
            middleware_address,
            timeout,
        }
    }

    /// Handle diagnostic data received on `channel`.
    ///
    /// Unregistered senders get `{}` plus a `data.error` event. Registered
    /// senders get `{<middleware address>: <latency ms>}`; when the probe
    /// fails the latency is `null` and an `error` key carries the reason.
    pub async fn handle(&self, channel: &ChannelId, payload: &Value) -> Value {
        counter!(DIAGNOSTIC_MESSAGES_TOTAL).increment(1);

        let registered = self
            .transport
            .connection_of(channel)
            .filter(|connection| self.registry.contains(connection));
        let Some(connection) = registered else {
            error!(channel_id = %channel, "{NON_REGISTERED_CLIENT}");
            counter!(DIAGNOSTIC_REJECTIONS_TOTAL).increment(1);
            let _ = self.transport.emit(
                channel,
                ChannelEvent::DataError {
                    message: NON_REGISTERED_CLIENT.into(),
                },
            );
            return Value::Object(Map::new());
        };
        info!(connection_id = %connection, channel_id = %channel, data = %payload, "client sent data");

        let mut reply = Map::new();
        match self.measure().await {
            Ok(latency) => {
                let latency_ms = latency.as_micros() as f64 / 1000.0;
                info!(connection_id = %connection, latency_ms, "middleware latency measured");
                let _ = reply.insert(self.middleware_address.clone(), json!(latency_ms));
            }
            Err(err) => {
                warn!(connection_id = %connection, error = %err, "middleware probe failed");
                counter!(PROBE_FAILURES_TOTAL, "kind" => err.error_kind()).increment(1);
                let _ = reply.insert(self.middleware_address.clone(), Value::Null);
                let _ = reply.insert("error".into(), Value::String(err.to_string()));
            }
        }
        Value::Object(reply)
    }

    /// Probe on a separate task bounded by the diagnostic timeout.
    async fn measure(&self) -> Result<Duration, ProbeError> {
        let host = host_of(&self.middleware_address)?;
        let probe = Arc::clone(&self.probe);
        let target = host.clone();
        let mut task = tokio::spawn(async move { probe.probe(&target).await });

        match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(ProbeError::Unreachable {
                host,
                reason: join_err.to_string(),
            }),
            Err(_) => {
                task.abort();
                Err(ProbeError::Timeout(self.timeout))
            }
        }
    }
}
