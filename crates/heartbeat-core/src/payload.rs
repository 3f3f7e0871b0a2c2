//! Metrics snapshot and the status payload pushed to the middleware.

use serde::{Deserialize, Serialize};

/// Battery level reported when the machine has no battery.
pub const FULL_BATTERY: u8 = 100;

/// Robot identity used when none is configured.
pub const DEFAULT_ROBOT_ID: &str = "00000000-0000-0000-0000-000000000000";

/// CPU utilisation, either one aggregate percentage or one per core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CpuUtilisation {
    Aggregate(f32),
    PerCore(Vec<f32>),
}

impl CpuUtilisation {
    /// Mean across cores (or the aggregate value itself).
    pub fn mean(&self) -> f32 {
        match self {
            Self::Aggregate(v) => *v,
            Self::PerCore(cores) if cores.is_empty() => 0.0,
            Self::PerCore(cores) => cores.iter().sum::<f32>() / cores.len() as f32,
        }
    }
}

/// One reading of local machine health.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricsSnapshot {
    /// Battery charge in percent, `None` when no battery is present.
    pub battery_percent: Option<f32>,
    pub cpu: CpuUtilisation,
    pub ram_percent: f32,
}

/// Status payload sent to the middleware on every heartbeat tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPayload {
    pub id: String,
    pub action_sequence_id: Option<i64>,
    pub currently_executed_action_index: Option<i64>,
    pub battery_level: u8,
    pub cpu_utilisation: CpuUtilisation,
    pub ram_utilisation: f32,
}

impl HeartbeatPayload {
    /// Build a payload from a fresh snapshot. The battery percentage is
    /// truncated toward zero and clamped to 0..=100; a missing battery
    /// reports [`FULL_BATTERY`].
    pub fn from_snapshot(robot_id: impl Into<String>, snapshot: &MetricsSnapshot) -> Self {
        Self {
            id: robot_id.into(),
            action_sequence_id: None,
            currently_executed_action_index: None,
            battery_level: snapshot.battery_percent.map_or(FULL_BATTERY, battery_level),
            cpu_utilisation: snapshot.cpu.clone(),
            ram_utilisation: snapshot.ram_percent,
        }
    }
}

fn battery_level(percent: f32) -> u8 {
    if percent.is_nan() {
        return FULL_BATTERY;
    }
    percent.trunc().clamp(0.0, 100.0) as u8
}
