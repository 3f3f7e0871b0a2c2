//! Control command processing and the per-connection INIT state machine.

use std::sync::Arc;

use heartbeat_core::command::ALREADY_INITIALIZED;
use heartbeat_core::{ChannelId, CommandResponse, ConnectionId, ControlCommand};
use heartbeat_telemetry::metrics::{COMMAND_ERRORS_TOTAL, COMMANDS_TOTAL, SESSIONS_REGISTERED};
use metrics::{counter, gauge};
use tracing::{error, info, warn};

use crate::registry::SessionRegistry;
use crate::transport::{ChannelEvent, ChannelTransport};

/// Registration state of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Unregistered,
    Registered,
}

/// Applies control commands received on a control channel.
///
/// `INIT` registers the connection; every other command type is accepted
/// and acknowledged without further effect.
pub struct CommandProcessor {
    registry: Arc<SessionRegistry>,
    transport: Arc<dyn ChannelTransport>,
}

impl CommandProcessor {
    pub fn new(registry: Arc<SessionRegistry>, transport: Arc<dyn ChannelTransport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Registration state of `connection`; only `INIT` moves it forward.
    pub fn state_of(&self, connection: &ConnectionId) -> SessionState {
        if self.registry.contains(connection) {
            SessionState::Registered
        } else {
            SessionState::Unregistered
        }
    }

    pub fn process(&self, command: &ControlCommand, channel: &ChannelId) -> CommandResponse {
        counter!(COMMANDS_TOTAL, "cmd_type" => command.cmd_type.to_string()).increment(1);

        let Some(connection) = self.transport.connection_of(channel) else {
            warn!(channel_id = %channel, %command, "command on unknown control channel");
            counter!(COMMAND_ERRORS_TOTAL).increment(1);
            return CommandResponse::rejected(format!("Unknown control channel {channel}"));
        };
        info!(connection_id = %connection, channel_id = %channel, %command, "control command processing");

        if command.is_init() {
            let registered = match self.state_of(&connection) {
                SessionState::Unregistered => self
                    .registry
                    .register(connection.clone(), channel.clone())
                    .map_err(|err| err.to_string()),
                SessionState::Registered => Err(ALREADY_INITIALIZED.to_string()),
            };
            if let Err(reason) = registered {
                error!(connection_id = %connection, error = %reason, "client attempted to call initialization multiple times");
                counter!(COMMAND_ERRORS_TOTAL).increment(1);
                let _ = self.transport.emit(
                    channel,
                    ChannelEvent::CommandError {
                        message: ALREADY_INITIALIZED.into(),
                    },
                );
                return CommandResponse::rejected(ALREADY_INITIALIZED);
            }
            gauge!(SESSIONS_REGISTERED).set(self.registry.len() as f64);
        }

        let results = self
            .transport
            .data_channel_of(&connection)
            .map_or_else(|| "none".to_string(), |c| c.to_string());
        let message = format!(
            "Control command applied, connection {connection}, channel {channel}, results channel {results}, command {command}"
        );
        info!("{message}");
        CommandResponse::accepted(message)
    }
}
