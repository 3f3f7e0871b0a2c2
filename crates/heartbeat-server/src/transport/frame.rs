//! Wire frames exchanged over the WebSocket.

use heartbeat_core::{ChannelId, CommandResponse, ConnectionId, ControlCommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ChannelEvent;

/// Client → server frame.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Control command on the control channel.
    Command {
        #[serde(default)]
        id: Option<Value>,
        data: ControlCommand,
    },
    /// Named event on the data channel.
    Data {
        #[serde(default)]
        id: Option<Value>,
        event: String,
        #[serde(default)]
        data: Value,
    },
}

/// Channel ids handed to the client when it connects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstablishedData {
    pub connection_id: ConnectionId,
    pub control_channel_id: ChannelId,
    pub data_channel_id: ChannelId,
}

/// Payload of error events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    pub message: String,
}

/// Server → client frame.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "connection.established")]
    ConnectionEstablished {
        timestamp: String,
        data: EstablishedData,
    },
    #[serde(rename = "command.result")]
    CommandResult {
        id: Option<Value>,
        accepted: bool,
        message: String,
    },
    #[serde(rename = "data.result")]
    DataResult { id: Option<Value>, data: Value },
    #[serde(rename = "command.error")]
    CommandError { data: ErrorData },
    #[serde(rename = "data.error")]
    DataError { data: ErrorData },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerFrame {
    pub fn established(data: EstablishedData) -> Self {
        Self::ConnectionEstablished {
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }

    pub fn command_result(id: Option<Value>, response: CommandResponse) -> Self {
        Self::CommandResult {
            id,
            accepted: response.accepted,
            message: response.message,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self)
            .map_err(|e| tracing::error!(error = %e, "failed to serialize frame"))
            .ok()
    }
}

impl From<ChannelEvent> for ServerFrame {
    fn from(event: ChannelEvent) -> Self {
        match event {
            ChannelEvent::CommandError { message } => Self::CommandError {
                data: ErrorData { message },
            },
            ChannelEvent::DataError { message } => Self::DataError {
                data: ErrorData { message },
            },
        }
    }
}
