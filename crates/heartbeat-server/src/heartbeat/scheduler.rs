//! Periodic heartbeat: snapshot local metrics and push them to the middleware.

use std::sync::Arc;
use std::time::Duration;

use heartbeat_core::HeartbeatPayload;
use heartbeat_telemetry::metrics::{
    HEARTBEAT_METRICS_FAILURES_TOTAL, HEARTBEAT_PUSH_FAILURES_TOTAL, HEARTBEAT_PUSHES_TOTAL,
};
use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::metrics_source::MetricsSource;
use super::sender::HeartbeatPublisher;
use crate::config::ServerConfig;

/// What happened on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Delivered,
    MetricsUnavailable,
    PushFailed,
}

/// Pushes one heartbeat per interval until cancelled.
///
/// A failed tick is logged and dropped; the next tick takes a fresh snapshot.
/// Cancellation is observed between ticks, so an in-flight push always
/// completes (bounded by the publisher's own timeout).
pub struct HeartbeatScheduler {
    source: Arc<dyn MetricsSource>,
    publisher: Arc<dyn HeartbeatPublisher>,
    robot_id: String,
    interval: Duration,
    repeat_on_error: bool,
}

impl HeartbeatScheduler {
    /// Smallest accepted interval; shorter values are raised to it.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    pub fn new(
        source: Arc<dyn MetricsSource>,
        publisher: Arc<dyn HeartbeatPublisher>,
        robot_id: impl Into<String>,
        interval: Duration,
        repeat_on_error: bool,
    ) -> Self {
        if interval < Self::MIN_INTERVAL {
            warn!(?interval, "heartbeat interval too small, using {:?}", Self::MIN_INTERVAL);
        }
        Self {
            source,
            publisher,
            robot_id: robot_id.into(),
            interval: interval.max(Self::MIN_INTERVAL),
            repeat_on_error,
        }
    }

    pub fn from_config(
        config: &ServerConfig,
        source: Arc<dyn MetricsSource>,
        publisher: Arc<dyn HeartbeatPublisher>,
    ) -> Self {
        Self::new(
            source,
            publisher,
            config.robot_id.clone(),
            config.heartbeat_interval(),
            config.repeat_on_error,
        )
    }

    /// Take one snapshot and publish it.
    pub async fn tick(&self) -> TickOutcome {
        let source = Arc::clone(&self.source);
        let snapshot = match tokio::task::spawn_blocking(move || source.snapshot()).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(err)) => {
                warn!(error = %err, "metrics unavailable, skipping heartbeat");
                counter!(HEARTBEAT_METRICS_FAILURES_TOTAL).increment(1);
                return TickOutcome::MetricsUnavailable;
            }
            Err(join_err) => {
                warn!(error = %join_err, "metrics collection task failed, skipping heartbeat");
                counter!(HEARTBEAT_METRICS_FAILURES_TOTAL).increment(1);
                return TickOutcome::MetricsUnavailable;
            }
        };

        let payload = HeartbeatPayload::from_snapshot(self.robot_id.clone(), &snapshot);
        match self.publisher.publish(&payload, self.repeat_on_error).await {
            Ok(()) => {
                debug!(
                    battery = payload.battery_level,
                    cpu = payload.cpu_utilisation.mean(),
                    ram = payload.ram_utilisation,
                    "heartbeat delivered"
                );
                counter!(HEARTBEAT_PUSHES_TOTAL).increment(1);
                TickOutcome::Delivered
            }
            Err(err) => {
                warn!(error = %err, kind = err.error_kind(), "heartbeat push failed, dropping");
                counter!(HEARTBEAT_PUSH_FAILURES_TOTAL, "kind" => err.error_kind()).increment(1);
                TickOutcome::PushFailed
            }
        }
    }

    /// Tick every interval until `cancel` fires. The first tick happens one
    /// interval after start.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_ms = self.interval.as_millis() as u64,
            robot_id = %self.robot_id,
            "heartbeat scheduler started"
        );

        let mut ticks: u64 = 0;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let _ = self.tick().await;
                    ticks += 1;
                }
            }
        }
        info!(ticks, "heartbeat scheduler stopped");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
