//! Server configuration with environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ServerConfig::default()`]
//! 2. Apply environment variable overrides
//! 3. The binary applies CLI flags last

use std::time::Duration;

use heartbeat_core::payload::DEFAULT_ROBOT_ID;
use serde::{Deserialize, Serialize};

/// Configuration for the heartbeat module.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"0.0.0.0"`).
    pub host: String,
    /// Port to bind (default `5898`, `0` auto-assigns).
    pub port: u16,
    /// Middleware base address, with or without scheme.
    pub middleware_address: String,
    /// Robot identity reported in every heartbeat.
    pub robot_id: String,
    /// Interval between heartbeat pushes in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Timeout for a single heartbeat POST in milliseconds.
    pub push_timeout_ms: u64,
    /// Retry transient push failures immediately.
    pub repeat_on_error: bool,
    /// Report CPU utilisation per core instead of one aggregate value.
    pub cpu_per_core: bool,
    /// TCP port used by the reachability probe.
    pub probe_port: u16,
    /// Probe attempts averaged into one latency value.
    pub probe_attempts: u32,
    /// Timeout of a single probe attempt in milliseconds.
    pub probe_timeout_ms: u64,
    /// Per-connection outbound frame queue.
    pub max_send_queue: usize,
    /// Interval between server-initiated WebSocket pings in milliseconds.
    pub ping_interval_ms: u64,
    /// A client silent for this long is disconnected (milliseconds).
    pub idle_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5898,
            middleware_address: "127.0.0.1".into(),
            robot_id: DEFAULT_ROBOT_ID.into(),
            heartbeat_interval_ms: 1000,
            push_timeout_ms: 2000,
            repeat_on_error: false,
            cpu_per_core: false,
            probe_port: 80,
            probe_attempts: 4,
            probe_timeout_ms: 1000,
            max_send_queue: 256,
            ping_interval_ms: 30_000,
            idle_timeout_ms: 90_000,
        }
    }
}

impl ServerConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        apply_env_overrides(&mut config);
        config
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_millis(self.push_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Upper bound for one whole diagnostic probe, all attempts included.
    pub fn diagnostic_timeout(&self) -> Duration {
        self.probe_timeout() * self.probe_attempts.max(1) + Duration::from_millis(500)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Apply environment variable overrides.
///
/// Invalid values are logged and ignored (default retained).
pub fn apply_env_overrides(config: &mut ServerConfig) {
    if let Some(v) = read_env_string("HEARTBEAT_HOST") {
        config.host = v;
    }
    if let Some(v) = read_env_u16("HEARTBEAT_PORT", 1, 65535) {
        config.port = v;
    }
    if let Some(v) = read_env_string("MIDDLEWARE_ADDRESS") {
        config.middleware_address = v;
    }
    if let Some(v) = read_env_string("MIDDLEWARE_ROBOT_ID") {
        config.robot_id = v;
    }
    if let Some(v) = read_env_secs_as_ms("MIDDLEWARE_REPORT_INTERVAL", 0.1, 3600.0) {
        config.heartbeat_interval_ms = v;
    }
    if let Some(v) = read_env_u64("HEARTBEAT_PUSH_TIMEOUT_MS", 100, 60_000) {
        config.push_timeout_ms = v;
    }
    if let Some(v) = read_env_bool("HEARTBEAT_REPEAT_ON_ERROR") {
        config.repeat_on_error = v;
    }
    if let Some(v) = read_env_bool("HEARTBEAT_CPU_PER_CORE") {
        config.cpu_per_core = v;
    }
    if let Some(v) = read_env_u16("HEARTBEAT_PROBE_PORT", 1, 65535) {
        config.probe_port = v;
    }
    if let Some(v) = read_env_u64("HEARTBEAT_PROBE_ATTEMPTS", 1, 20) {
        config.probe_attempts = v as u32;
    }
    if let Some(v) = read_env_u64("HEARTBEAT_PROBE_TIMEOUT_MS", 10, 60_000) {
        config.probe_timeout_ms = v;
    }
    if let Some(v) = read_env_u64("HEARTBEAT_MAX_SEND_QUEUE", 1, 65_536) {
        config.max_send_queue = v as usize;
    }
    if let Some(v) = read_env_u64("HEARTBEAT_PING_INTERVAL_MS", 100, 600_000) {
        config.ping_interval_ms = v;
    }
    if let Some(v) = read_env_u64("HEARTBEAT_IDLE_TIMEOUT_MS", 100, 3_600_000) {
        config.idle_timeout_ms = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse fractional seconds within a range into whole milliseconds.
pub fn parse_secs_as_ms(val: &str, min: f64, max: f64) -> Option<u64> {
    let secs: f64 = val.trim().parse().ok()?;
    (secs.is_finite() && secs >= min && secs <= max).then(|| (secs * 1000.0).round() as u64)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u16(name: &str, min: u16, max: u16) -> Option<u16> {
    let val = std::env::var(name).ok()?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_secs_as_ms(name: &str, min: f64, max: f64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_secs_as_ms(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid interval env var, ignoring");
    }
    result
}
