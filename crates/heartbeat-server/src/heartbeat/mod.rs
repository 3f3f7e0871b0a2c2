//! Middleware heartbeat: metrics collection, delivery and scheduling.

pub mod metrics_source;
pub mod scheduler;
pub mod sender;

pub use metrics_source::{MetricsSource, SysinfoMetricsSource};
pub use scheduler::{HeartbeatScheduler, TickOutcome};
pub use sender::{HeartbeatPublisher, HttpHeartbeatSender};
