//! WebSocket transport: connections, logical channels, frame dispatch.
//!
//! Each WebSocket is one physical connection carrying two logical channels,
//! a control channel for commands and a data channel for diagnostics.

pub mod connection;
pub mod frame;
pub mod handler;
pub mod session;

use heartbeat_core::{ChannelId, ConnectionId};

/// Data event carrying ad-hoc diagnostic JSON from a client.
pub const HEARTBEAT_CLIENT_EVENT: &str = "heart_beat_client_event";

/// Out-of-band event pushed onto a logical channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A control command failed.
    CommandError { message: String },
    /// Data was rejected; delivered on the data error channel.
    DataError { message: String },
}

/// The part of the transport the request handlers depend on.
pub trait ChannelTransport: Send + Sync {
    /// Connection that owns `channel`, if the channel is open.
    fn connection_of(&self, channel: &ChannelId) -> Option<ConnectionId>;

    /// Data (result) channel currently associated with `connection`.
    fn data_channel_of(&self, connection: &ConnectionId) -> Option<ChannelId>;

    /// Push `event` to the client on `channel`. Returns `false` if it could
    /// not be queued.
    fn emit(&self, channel: &ChannelId, event: ChannelEvent) -> bool;
}
