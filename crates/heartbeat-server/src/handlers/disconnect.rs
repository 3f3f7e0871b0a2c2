//! Connection teardown.

use std::sync::Arc;

use heartbeat_core::ConnectionId;
use heartbeat_telemetry::metrics::SESSIONS_REGISTERED;
use metrics::gauge;
use tracing::{debug, info};

use crate::registry::SessionRegistry;

pub struct DisconnectHandler {
    registry: Arc<SessionRegistry>,
}

impl DisconnectHandler {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Drop the registration of `connection`, if any. Returns whether a
    /// session was removed; an unregistered connection is a no-op.
    pub fn handle(&self, connection: &ConnectionId) -> bool {
        match self.registry.remove(connection) {
            Ok(channel) => {
                info!(connection_id = %connection, channel_id = %channel, "client disconnected, session removed");
                gauge!(SESSIONS_REGISTERED).set(self.registry.len() as f64);
                true
            }
            Err(err) => {
                debug!(connection_id = %connection, error = %err, "disconnect without registration");
                false
            }
        }
    }
}
