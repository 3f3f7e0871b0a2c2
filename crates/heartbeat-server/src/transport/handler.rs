//! Frame dispatch: parses one inbound text frame and routes it to a handler.

use tracing::{debug, instrument, warn};

use super::HEARTBEAT_CLIENT_EVENT;
use super::connection::Connection;
use super::frame::{ClientFrame, ServerFrame};
use crate::handlers::Handlers;

/// Handle one inbound text frame and return the reply to send back.
///
/// Commands are bound to the connection's control channel and data events to
/// its data channel, regardless of what the client claims.
#[instrument(skip_all, fields(connection_id = %connection.id))]
pub async fn handle_frame(text: &str, connection: &Connection, handlers: &Handlers) -> ServerFrame {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "invalid frame received");
            return ServerFrame::error(format!("Invalid frame: {e}"));
        }
    };

    match frame {
        ClientFrame::Command { id, data } => {
            debug!(cmd_type = %data.cmd_type, "dispatching command");
            let response = handlers.command.process(&data, &connection.control_channel);
            ServerFrame::command_result(id, response)
        }
        ClientFrame::Data { id, event, data } if event == HEARTBEAT_CLIENT_EVENT => {
            let reply = handlers
                .diagnostic
                .handle(&connection.data_channel, &data)
                .await;
            ServerFrame::DataResult { id, data: reply }
        }
        ClientFrame::Data { event, .. } => {
            warn!(event = %event, "unknown data event");
            ServerFrame::error(format!("Unknown data event: {event}"))
        }
    }
}
