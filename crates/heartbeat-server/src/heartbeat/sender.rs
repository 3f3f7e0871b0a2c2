//! Heartbeat delivery to the middleware over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use heartbeat_core::{HeartbeatPayload, PushError};
use tracing::debug;

/// Middleware endpoint that receives robot heartbeats.
pub const STATUS_PATH: &str = "/Heartbeat/robot";

/// Attempts per heartbeat when `repeat_on_error` is set.
const MAX_ATTEMPTS: u32 = 3;

/// Delivers one heartbeat payload.
#[async_trait]
pub trait HeartbeatPublisher: Send + Sync {
    /// Push `payload`. With `repeat_on_error`, transient failures are retried
    /// before giving up.
    async fn publish(&self, payload: &HeartbeatPayload, repeat_on_error: bool)
        -> Result<(), PushError>;
}

/// Full status URL for a middleware address. Adds `http://` when the address
/// has no scheme and appends [`STATUS_PATH`] unless already present.
pub fn status_url(address: &str) -> String {
    let trimmed = address.trim().trim_end_matches('/');
    let base = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    if base.ends_with(STATUS_PATH) {
        base
    } else {
        format!("{base}{STATUS_PATH}")
    }
}

/// [`HeartbeatPublisher`] that POSTs JSON with `reqwest`.
pub struct HttpHeartbeatSender {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpHeartbeatSender {
    pub fn new(middleware_address: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(concat!("heartbeat-module/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_default(),
            url: status_url(middleware_address),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post_once(&self, payload: &HeartbeatPayload) -> Result<(), PushError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PushError::Timeout(self.timeout)
                } else {
                    PushError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(PushError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl HeartbeatPublisher for HttpHeartbeatSender {
    async fn publish(
        &self,
        payload: &HeartbeatPayload,
        repeat_on_error: bool,
    ) -> Result<(), PushError> {
        let attempts = if repeat_on_error { MAX_ATTEMPTS } else { 1 };
        let mut attempt = 1;
        loop {
            match self.post_once(payload).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    debug!(attempt, error = %err, url = %self.url, "heartbeat push failed, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
