use std::time::Duration;

use crate::ids::{ChannelId, ConnectionId};

/// Session registry failures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("connection {connection} is already registered on channel {channel}")]
    AlreadyRegistered {
        connection: ConnectionId,
        channel: ChannelId,
    },
    #[error("connection {0} is not registered")]
    NotRegistered(ConnectionId),
}

impl RegistryError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AlreadyRegistered { .. } => "already_registered",
            Self::NotRegistered(_) => "not_registered",
        }
    }
}

/// Reachability probe failures.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid probe host: {0}")]
    InvalidHost(String),
    #[error("host {host} unreachable: {reason}")]
    Unreachable { host: String, reason: String },
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}

impl ProbeError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidHost(_) => "invalid_host",
            Self::Unreachable { .. } => "unreachable",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// The local metrics source could not produce a snapshot.
#[derive(Clone, Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("metrics unavailable: {0}")]
    Unavailable(String),
}

impl MetricsError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "metrics_unavailable",
        }
    }
}

/// Heartbeat delivery failures.
#[derive(Clone, Debug, thiserror::Error)]
pub enum PushError {
    #[error("network error: {0}")]
    Network(String),
    #[error("middleware returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("push timed out after {0:?}")]
    Timeout(Duration),
}

impl PushError {
    /// Network hiccups, timeouts and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => (500..=599).contains(status),
        }
    }

    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network_error",
            Self::Status { .. } => "status_error",
            Self::Timeout(_) => "timeout",
        }
    }
}
