use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use heartbeat_server::{Collaborators, HeartbeatServer, ServerConfig};
use heartbeat_telemetry::{LogFormat, TelemetryConfig, init_telemetry};

/// Robot heartbeat module: reports robot status to the middleware and
/// answers diagnostic requests from connected clients.
#[derive(Debug, Parser)]
#[command(name = "heartbeat-module", version)]
struct Cli {
    /// Bind host (overrides HEARTBEAT_HOST).
    #[arg(long)]
    host: Option<String>,
    /// Bind port (overrides HEARTBEAT_PORT).
    #[arg(long)]
    port: Option<u16>,
    /// Middleware address (overrides MIDDLEWARE_ADDRESS).
    #[arg(long)]
    middleware_address: Option<String>,
    /// Robot id reported in heartbeats (overrides MIDDLEWARE_ROBOT_ID).
    #[arg(long)]
    robot_id: Option<String>,
    /// Log output format: pretty or json.
    #[arg(long, env = "HEARTBEAT_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,
    /// Seconds to wait for background tasks on shutdown.
    #[arg(long, default_value_t = 30)]
    shutdown_timeout_secs: u64,
}

impl Cli {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(address) = &self.middleware_address {
            config.middleware_address.clone_from(address);
        }
        if let Some(robot_id) = &self.robot_id {
            config.robot_id.clone_from(robot_id);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_telemetry(&TelemetryConfig {
        format: cli.log_format,
        ..TelemetryConfig::default()
    })
    .context("failed to initialize logging")?;

    let mut config = ServerConfig::from_env();
    cli.apply(&mut config);
    tracing::info!(
        bind = %config.bind_address(),
        middleware = %config.middleware_address,
        robot_id = %config.robot_id,
        interval_ms = config.heartbeat_interval_ms,
        "starting heartbeat module"
    );

    let metrics_handle = heartbeat_telemetry::metrics::install_recorder()
        .context("failed to install metrics recorder")?;

    let collaborators = Collaborators::from_config(&config);
    let server = HeartbeatServer::new(config, collaborators).with_metrics_handle(metrics_handle);
    let addr = server
        .listen()
        .await
        .context("failed to bind heartbeat module")?;
    server.start_heartbeat();
    tracing::info!(%addr, "heartbeat module ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("Terminating ...");
    server
        .shutdown()
        .graceful_shutdown(Some(Duration::from_secs(cli.shutdown_timeout_secs)))
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_config() {
        let cli = Cli::parse_from([
            "heartbeat-module",
            "--port",
            "6000",
            "--middleware-address",
            "mw.local:8080",
            "--robot-id",
            "robot-9",
        ]);
        let mut config = ServerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.port, 6000);
        assert_eq!(config.middleware_address, "mw.local:8080");
        assert_eq!(config.robot_id, "robot-9");
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn no_flags_keep_config() {
        let cli = Cli::parse_from(["heartbeat-module"]);
        let mut config = ServerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.port, 5898);
        assert_eq!(cli.shutdown_timeout_secs, 30);
    }

    #[test]
    fn log_format_parses() {
        let cli = Cli::parse_from(["heartbeat-module", "--log-format", "json"]);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
