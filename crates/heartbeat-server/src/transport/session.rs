//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use heartbeat_telemetry::metrics::{
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};
use metrics::{counter, gauge};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::ConnectionTable;
use super::handler::handle_frame;
use crate::config::ServerConfig;
use crate::handlers::Handlers;

/// Ping cadence and idle limit for WebSocket sessions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Keepalive {
    pub ping_interval: Duration,
    pub idle_timeout: Duration,
}

impl Keepalive {
    /// Zero durations are raised to one millisecond.
    pub fn new(ping_interval: Duration, idle_timeout: Duration) -> Self {
        let floor = Duration::from_millis(1);
        Self {
            ping_interval: ping_interval.max(floor),
            idle_timeout: idle_timeout.max(floor),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.ping_interval(), config.idle_timeout())
    }
}

impl Default for Keepalive {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(90))
    }
}

/// Run a WebSocket session for a connected client.
///
/// 1. Allocates the connection and its control/data channels
/// 2. Sends `connection.established` with the channel ids
/// 3. Processes inbound frames one at a time, in arrival order
/// 4. Pings periodically and drops clients that stay silent
/// 5. Runs the disconnect handler exactly once on the way out
pub async fn run_ws_session(
    ws: WebSocket,
    connections: Arc<ConnectionTable>,
    handlers: Arc<Handlers>,
    keepalive: Keepalive,
    shutdown: CancellationToken,
) {
    let (connection, mut send_rx) = connections.open();
    let connection_id = connection.id.clone();
    info!(%connection_id, "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let _ = connection.send_frame(&connection.established());

    let (mut ws_tx, mut ws_rx) = ws.split();

    // Outbound forwarder with periodic Ping frames.
    let writer_conn = Arc::clone(&connection);
    let mut writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(keepalive.ping_interval);
        let _ = ping.tick().await;

        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if writer_conn.idle_for() > keepalive.idle_timeout {
                        warn!(
                            connection_id = %writer_conn.id,
                            idle_timeout_ms = keepalive.idle_timeout.as_millis() as u64,
                            "client unresponsive, disconnecting"
                        );
                        break;
                    }
                    if ws_tx.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                }
                () = shutdown.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            _ = &mut writer => break,
        };
        let Some(Ok(msg)) = msg else { break };
        connection.mark_alive();

        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(s) => s.to_string(),
                Err(_) => {
                    debug!(%connection_id, len = data.len(), "ignoring non-UTF8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => {
                info!(%connection_id, "client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        let reply = handle_frame(&text, &connection, &handlers).await;
        if !connection.send_frame(&reply) {
            debug!(%connection_id, "failed to enqueue reply");
        }
    }

    writer.abort();
    let session_removed = handlers.disconnect.handle(&connection_id);
    let _ = connections.close(&connection_id);
    info!(
        %connection_id,
        session_removed,
        duration_secs = connection.connected_at.elapsed().as_secs(),
        dropped_frames = connection.drop_count(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
}
