//! # heartbeat-core
//!
//! Domain types shared by the heartbeat module: connection and channel ids,
//! control commands, metrics snapshots, the heartbeat payload pushed to the
//! middleware, and the error taxonomy.

#![deny(unsafe_code)]

pub mod command;
pub mod errors;
pub mod ids;
pub mod payload;

pub use command::{CommandResponse, ControlCmdType, ControlCommand};
pub use errors::{MetricsError, ProbeError, PushError, RegistryError};
pub use ids::{ChannelId, ConnectionId};
pub use payload::{CpuUtilisation, HeartbeatPayload, MetricsSnapshot};
