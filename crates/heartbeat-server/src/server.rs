//! HTTP/WebSocket server: routes, shared state and task startup.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::handlers::Handlers;
use crate::health::{self, HealthResponse};
use crate::heartbeat::{
    HeartbeatPublisher, HeartbeatScheduler, HttpHeartbeatSender, MetricsSource,
    SysinfoMetricsSource,
};
use crate::probe::{ReachabilityProbe, TcpProbe};
use crate::registry::SessionRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::transport::connection::ConnectionTable;
use crate::transport::session::{Keepalive, run_ws_session};

/// External dependencies of the server, swappable in tests.
#[derive(Clone)]
pub struct Collaborators {
    pub probe: Arc<dyn ReachabilityProbe>,
    pub metrics_source: Arc<dyn MetricsSource>,
    pub publisher: Arc<dyn HeartbeatPublisher>,
}

impl Collaborators {
    /// TCP probe, sysinfo metrics and HTTP delivery, configured from `config`.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            probe: Arc::new(TcpProbe::new(
                config.probe_port,
                config.probe_attempts,
                config.probe_timeout(),
            )),
            metrics_source: Arc::new(SysinfoMetricsSource::new(config.cpu_per_core)),
            publisher: Arc::new(HttpHeartbeatSender::new(
                &config.middleware_address,
                config.push_timeout(),
            )),
        }
    }
}

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub connections: Arc<ConnectionTable>,
    pub handlers: Arc<Handlers>,
    pub registry: Arc<SessionRegistry>,
    pub keepalive: Keepalive,
    pub shutdown: CancellationToken,
    pub start_time: Instant,
    pub metrics: Option<PrometheusHandle>,
}

pub struct HeartbeatServer {
    config: ServerConfig,
    collaborators: Collaborators,
    registry: Arc<SessionRegistry>,
    connections: Arc<ConnectionTable>,
    handlers: Arc<Handlers>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl HeartbeatServer {
    pub fn new(config: ServerConfig, collaborators: Collaborators) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let connections = Arc::new(ConnectionTable::new(config.max_send_queue));
        let handlers = Arc::new(Handlers::new(
            &config,
            Arc::clone(&registry),
            connections.clone(),
            Arc::clone(&collaborators.probe),
        ));
        Self {
            config,
            collaborators,
            registry,
            connections,
            handlers,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics_handle(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            connections: self.connections.clone(),
            handlers: self.handlers.clone(),
            registry: self.registry.clone(),
            keepalive: Keepalive::from_config(&self.config),
            shutdown: self.shutdown.token(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown. Returns the
    /// bound address (useful with port `0`).
    pub async fn listen(&self) -> std::io::Result<SocketAddr> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_address()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "http server failed");
            }
        });
        self.shutdown.track(handle);
        info!(%addr, "heartbeat module listening");
        Ok(addr)
    }

    /// Start the periodic middleware heartbeat.
    pub fn start_heartbeat(&self) {
        let scheduler = HeartbeatScheduler::from_config(
            &self.config,
            Arc::clone(&self.collaborators.metrics_source),
            Arc::clone(&self.collaborators.publisher),
        );
        self.shutdown.track(scheduler.spawn(self.shutdown.token()));
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn connections(&self) -> &Arc<ConnectionTable> {
        &self.connections
    }

    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.shutdown.is_cancelled() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    ws.on_upgrade(move |socket| {
        run_ws_session(
            socket,
            state.connections,
            state.handlers,
            state.keepalive,
            state.shutdown,
        )
    })
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.connections.len(),
        state.registry.len(),
    ))
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
