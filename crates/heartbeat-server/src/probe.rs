//! Middleware reachability probe.

use std::time::Duration;

use async_trait::async_trait;
use heartbeat_core::ProbeError;
use tokio::net::TcpStream;
use tokio::time::Instant;

/// Measures round-trip latency to a host.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Average round-trip time to `host`.
    async fn probe(&self, host: &str) -> Result<Duration, ProbeError>;
}

/// Extract the bare host from a middleware address that may or may not
/// carry a scheme, port or path.
pub fn host_of(address: &str) -> Result<String, ProbeError> {
    let trimmed = address.trim();
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let url = reqwest::Url::parse(&candidate)
        .map_err(|e| ProbeError::InvalidHost(format!("{address}: {e}")))?;
    match url.host_str() {
        Some(host) if !host.is_empty() => {
            Ok(host.trim_start_matches('[').trim_end_matches(']').to_string())
        }
        _ => Err(ProbeError::InvalidHost(address.to_string())),
    }
}

/// Round-trip time of a TCP handshake, averaged over several attempts.
///
/// Needs no raw-socket privileges, unlike ICMP echo.
#[derive(Clone, Debug)]
pub struct TcpProbe {
    port: u16,
    attempts: u32,
    attempt_timeout: Duration,
}

impl TcpProbe {
    pub fn new(port: u16, attempts: u32, attempt_timeout: Duration) -> Self {
        Self {
            port,
            attempts: attempts.max(1),
            attempt_timeout,
        }
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn probe(&self, host: &str) -> Result<Duration, ProbeError> {
        let mut samples = Vec::with_capacity(self.attempts as usize);
        let mut last_error = None;

        for _ in 0..self.attempts {
            let started = Instant::now();
            match tokio::time::timeout(self.attempt_timeout, TcpStream::connect((host, self.port)))
                .await
            {
                Ok(Ok(stream)) => {
                    samples.push(started.elapsed());
                    drop(stream);
                }
                Ok(Err(e)) => {
                    last_error = Some(ProbeError::Unreachable {
                        host: host.to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(_) => last_error = Some(ProbeError::Timeout(self.attempt_timeout)),
            }
        }

        if samples.is_empty() {
            return Err(last_error.unwrap_or_else(|| ProbeError::Unreachable {
                host: host.to_string(),
                reason: "no attempts made".into(),
            }));
        }
        Ok(samples.iter().sum::<Duration>() / samples.len() as u32)
    }
}
