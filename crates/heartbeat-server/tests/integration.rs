//! End-to-end tests against a real server using a WebSocket client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use heartbeat_core::{
    CpuUtilisation, HeartbeatPayload, MetricsError, MetricsSnapshot, ProbeError, PushError,
};
use heartbeat_server::heartbeat::{HeartbeatPublisher, MetricsSource};
use heartbeat_server::probe::ReachabilityProbe;
use heartbeat_server::{Collaborators, HeartbeatServer, ServerConfig};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(5);
const MIDDLEWARE: &str = "10.20.30.40";

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

// ── Fakes ──

struct FakeProbe;

#[async_trait]
impl ReachabilityProbe for FakeProbe {
    async fn probe(&self, _host: &str) -> Result<Duration, ProbeError> {
        Ok(Duration::from_millis(7))
    }
}

struct FakeMachine;

impl MetricsSource for FakeMachine {
    fn snapshot(&self) -> Result<MetricsSnapshot, MetricsError> {
        Ok(MetricsSnapshot {
            battery_percent: None,
            cpu: CpuUtilisation::Aggregate(25.0),
            ram_percent: 50.0,
        })
    }
}

#[derive(Default)]
struct CapturingPublisher {
    payloads: Mutex<Vec<HeartbeatPayload>>,
}

#[async_trait]
impl HeartbeatPublisher for CapturingPublisher {
    async fn publish(&self, payload: &HeartbeatPayload, _: bool) -> Result<(), PushError> {
        self.payloads.lock().push(payload.clone());
        Ok(())
    }
}

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        middleware_address: MIDDLEWARE.into(),
        ..ServerConfig::default()
    }
}

async fn boot_with(config: ServerConfig, collaborators: Collaborators) -> (String, HeartbeatServer) {
    let server = HeartbeatServer::new(config, collaborators);
    let addr = server.listen().await.unwrap();
    (format!("ws://{addr}/ws"), server)
}

async fn boot_server() -> (String, HeartbeatServer) {
    boot_with(
        test_config(),
        Collaborators {
            probe: Arc::new(FakeProbe),
            metrics_source: Arc::new(FakeMachine),
            publisher: Arc::new(CapturingPublisher::default()),
        },
    )
    .await
}

async fn connect(url: &str) -> WsStream {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

/// Read the next text message as JSON.
async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Read messages until one has the given `type`.
async fn read_until(ws: &mut WsStream, frame_type: &str) -> Value {
    loop {
        let msg = read_json(ws).await;
        if msg["type"] == frame_type {
            return msg;
        }
    }
}

/// Connect and consume the `connection.established` frame.
async fn open(url: &str) -> (WsStream, Value) {
    let mut ws = connect(url).await;
    let established = read_json(&mut ws).await;
    assert_eq!(established["type"], "connection.established");
    (ws, established)
}

async fn send(ws: &mut WsStream, frame: Value) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

async fn init(ws: &mut WsStream, id: u64) -> Value {
    send(ws, json!({"type": "command", "id": id, "data": {"cmd_type": "INIT"}})).await;
    read_until(ws, "command.result").await
}

async fn send_data(ws: &mut WsStream, id: u64, data: Value) {
    send(
        ws,
        json!({"type": "data", "id": id, "event": "heart_beat_client_event", "data": data}),
    )
    .await;
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ── Tests ──

#[tokio::test]
async fn established_frame_carries_channel_ids() {
    let (url, server) = boot_server().await;
    let (_ws, established) = open(&url).await;

    let data = &established["data"];
    assert!(data["connectionId"].as_str().unwrap().starts_with("conn_"));
    assert!(data["controlChannelId"].as_str().unwrap().starts_with("chan_"));
    assert!(data["dataChannelId"].as_str().unwrap().starts_with("chan_"));
    assert_ne!(data["controlChannelId"], data["dataChannelId"]);
    wait_for(|| server.connections().len() == 1).await;
}

#[tokio::test]
async fn init_is_accepted_and_registers() {
    let (url, server) = boot_server().await;
    let (mut ws, established) = open(&url).await;

    let result = init(&mut ws, 1).await;

    assert_eq!(result["id"], 1);
    assert_eq!(result["accepted"], true);
    let message = result["message"].as_str().unwrap();
    assert!(message.starts_with("Control command applied"));
    assert!(message.contains(established["data"]["dataChannelId"].as_str().unwrap()));
    assert_eq!(server.registry().len(), 1);
}

#[tokio::test]
async fn second_init_is_rejected_with_error_event() {
    let (url, server) = boot_server().await;
    let (mut ws, _) = open(&url).await;
    let _ = init(&mut ws, 1).await;

    send(&mut ws, json!({"type": "command", "id": 2, "data": {"cmd_type": "INIT"}})).await;
    let error = read_json(&mut ws).await;
    assert_eq!(error["type"], "command.error");
    assert_eq!(
        error["data"]["message"],
        "Initialization has already been called before"
    );

    let result = read_json(&mut ws).await;
    assert_eq!(result["type"], "command.result");
    assert_eq!(result["id"], 2);
    assert_eq!(result["accepted"], false);
    assert_eq!(
        result["message"],
        "Initialization has already been called before"
    );
    assert_eq!(server.registry().len(), 1);
}

#[tokio::test]
async fn other_command_is_echoed() {
    let (url, server) = boot_server().await;
    let (mut ws, _) = open(&url).await;

    send(
        &mut ws,
        json!({"type": "command", "id": "m1", "data": {"cmd_type": "MOVE", "x": 3}}),
    )
    .await;
    let result = read_until(&mut ws, "command.result").await;

    assert_eq!(result["id"], "m1");
    assert_eq!(result["accepted"], true);
    assert!(result["message"].as_str().unwrap().contains("MOVE"));
    assert!(server.registry().is_empty());
}

#[tokio::test]
async fn unregistered_data_gets_empty_object_and_error_event() {
    let (url, _server) = boot_server().await;
    let (mut ws, _) = open(&url).await;

    send_data(&mut ws, 5, json!({"battery": "low"})).await;

    let error = read_json(&mut ws).await;
    assert_eq!(error["type"], "data.error");
    assert_eq!(
        error["data"],
        json!({"message": "Non-registered client tried to send data"})
    );
    let result = read_json(&mut ws).await;
    assert_eq!(result["type"], "data.result");
    assert_eq!(result["id"], 5);
    assert_eq!(result["data"], json!({}));
}

#[tokio::test]
async fn registered_data_gets_middleware_latency() {
    let (url, _server) = boot_server().await;
    let (mut ws, _) = open(&url).await;
    let _ = init(&mut ws, 1).await;

    send_data(&mut ws, 2, json!({"hello": "robot"})).await;
    let result = read_until(&mut ws, "data.result").await;

    assert_eq!(result["id"], 2);
    assert_eq!(result["data"], json!({ MIDDLEWARE: 7.0 }));
}

#[tokio::test]
async fn real_tcp_probe_measures_local_listener() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let accept = tokio::spawn(async move {
        loop {
            let _ = listener.accept().await;
        }
    });

    let config = ServerConfig {
        middleware_address: "127.0.0.1".into(),
        probe_port: port,
        probe_attempts: 2,
        ..test_config()
    };
    let collaborators = Collaborators {
        metrics_source: Arc::new(FakeMachine),
        publisher: Arc::new(CapturingPublisher::default()),
        ..Collaborators::from_config(&config)
    };
    let (url, _server) = boot_with(config, collaborators).await;
    let (mut ws, _) = open(&url).await;
    let _ = init(&mut ws, 1).await;

    send_data(&mut ws, 2, Value::Null).await;
    let result = read_until(&mut ws, "data.result").await;

    assert!(result["data"]["127.0.0.1"].as_f64().unwrap() >= 0.0);
    accept.abort();
}

#[tokio::test]
async fn disconnect_removes_registration() {
    let (url, server) = boot_server().await;
    let (mut ws, _) = open(&url).await;
    let _ = init(&mut ws, 1).await;
    assert_eq!(server.registry().len(), 1);

    ws.close(None).await.unwrap();

    let registry = Arc::clone(server.registry());
    wait_for(|| registry.is_empty()).await;
    let connections = Arc::clone(server.connections());
    wait_for(|| connections.is_empty()).await;
}

fn short_keepalive_server_config() -> ServerConfig {
    ServerConfig {
        ping_interval_ms: 50,
        idle_timeout_ms: 300,
        ..test_config()
    }
}

async fn boot_short_keepalive() -> (String, HeartbeatServer) {
    boot_with(
        short_keepalive_server_config(),
        Collaborators {
            probe: Arc::new(FakeProbe),
            metrics_source: Arc::new(FakeMachine),
            publisher: Arc::new(CapturingPublisher::default()),
        },
    )
    .await
}

#[tokio::test]
async fn silent_client_is_dropped_and_unregistered() {
    let (url, server) = boot_short_keepalive().await;
    let (mut ws, _) = open(&url).await;
    let _ = init(&mut ws, 1).await;
    assert_eq!(server.registry().len(), 1);

    // Stop reading: pings go unanswered and nothing else arrives.
    let registry = Arc::clone(server.registry());
    wait_for(|| registry.is_empty()).await;
    let connections = Arc::clone(server.connections());
    wait_for(|| connections.is_empty()).await;
    drop(ws);
}

#[tokio::test]
async fn client_answering_pings_stays_registered() {
    let (url, server) = boot_short_keepalive().await;
    let (mut ws, _) = open(&url).await;
    let _ = init(&mut ws, 1).await;

    // Reading lets the client answer pings with pongs.
    let reader = tokio::spawn(async move { while let Some(Ok(_)) = ws.next().await {} });

    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(server.registry().len(), 1);
    assert_eq!(server.connections().len(), 1);
    reader.abort();
}

#[tokio::test]
async fn disconnect_without_registration_leaves_others_alone() {
    let (url, server) = boot_server().await;
    let (mut registered, _) = open(&url).await;
    let _ = init(&mut registered, 1).await;
    let (mut anonymous, _) = open(&url).await;

    anonymous.close(None).await.unwrap();

    let connections = Arc::clone(server.connections());
    wait_for(|| connections.len() == 1).await;
    assert_eq!(server.registry().len(), 1);

    // The registered client keeps working.
    send_data(&mut registered, 2, json!({})).await;
    let result = read_until(&mut registered, "data.result").await;
    assert_eq!(result["data"], json!({ MIDDLEWARE: 7.0 }));
}

#[tokio::test]
async fn reconnect_can_init_again() {
    let (url, server) = boot_server().await;
    let (mut first, _) = open(&url).await;
    let _ = init(&mut first, 1).await;
    first.close(None).await.unwrap();
    let registry = Arc::clone(server.registry());
    wait_for(|| registry.is_empty()).await;

    let (mut second, _) = open(&url).await;
    assert_eq!(init(&mut second, 1).await["accepted"], true);
}

#[tokio::test]
async fn each_connection_registers_independently() {
    let (url, server) = boot_server().await;
    let (mut a, _) = open(&url).await;
    let (mut b, _) = open(&url).await;

    assert_eq!(init(&mut a, 1).await["accepted"], true);
    assert_eq!(init(&mut b, 1).await["accepted"], true);
    assert_eq!(server.registry().len(), 2);
}

#[tokio::test]
async fn frames_are_answered_in_order() {
    let (url, _server) = boot_server().await;
    let (mut ws, _) = open(&url).await;
    let _ = init(&mut ws, 0).await;

    for id in 1..=5 {
        send_data(&mut ws, id, json!({"seq": id})).await;
    }
    for id in 1..=5 {
        let result = read_until(&mut ws, "data.result").await;
        assert_eq!(result["id"], id);
    }
}

#[tokio::test]
async fn malformed_frame_gets_error_and_connection_survives() {
    let (url, _server) = boot_server().await;
    let (mut ws, _) = open(&url).await;

    ws.send(Message::text("{not json")).await.unwrap();
    let error = read_json(&mut ws).await;
    assert_eq!(error["type"], "error");

    assert_eq!(init(&mut ws, 1).await["accepted"], true);
}

#[tokio::test]
async fn health_reports_connections_and_sessions() {
    let (url, server) = boot_server().await;
    let (mut ws, _) = open(&url).await;
    let _ = init(&mut ws, 1).await;

    let health_url = url.replace("ws://", "http://").replace("/ws", "/health");
    let body: Value = reqwest::get(&health_url).await.unwrap().json().await.unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 1);
    assert_eq!(body["registered_sessions"], 1);
    drop(server);
}

#[tokio::test]
async fn heartbeat_runs_until_shutdown() {
    let publisher = Arc::new(CapturingPublisher::default());
    let config = ServerConfig {
        heartbeat_interval_ms: 50,
        robot_id: "robot-42".into(),
        ..test_config()
    };
    let (_url, server) = boot_with(
        config,
        Collaborators {
            probe: Arc::new(FakeProbe),
            metrics_source: Arc::new(FakeMachine),
            publisher: publisher.clone(),
        },
    )
    .await;
    server.start_heartbeat();

    let captured = Arc::clone(&publisher);
    wait_for(|| captured.payloads.lock().len() >= 2).await;
    server
        .shutdown()
        .graceful_shutdown(Some(Duration::from_secs(5)))
        .await;

    let after_shutdown = publisher.payloads.lock().len();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(publisher.payloads.lock().len(), after_shutdown);

    let payloads = publisher.payloads.lock();
    let first = serde_json::to_value(&payloads[0]).unwrap();
    assert_eq!(first["id"], "robot-42");
    assert_eq!(first["batteryLevel"], 100);
    assert_eq!(first["cpuUtilisation"], 25.0);
    assert_eq!(first["ramUtilisation"], 50.0);
    assert!(first["actionSequenceId"].is_null());
    assert!(first["currentlyExecutedActionIndex"].is_null());
}

#[tokio::test]
async fn heartbeat_posts_to_middleware_over_http() {
    let middleware = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path("/Heartbeat/robot"))
        .respond_with(wiremock::ResponseTemplate::new(200))
        .mount(&middleware)
        .await;

    let config = ServerConfig {
        middleware_address: middleware.uri(),
        heartbeat_interval_ms: 50,
        ..test_config()
    };
    let collaborators = Collaborators {
        metrics_source: Arc::new(FakeMachine),
        ..Collaborators::from_config(&config)
    };
    let (_url, server) = boot_with(config, collaborators).await;
    server.start_heartbeat();

    tokio::time::sleep(Duration::from_millis(300)).await;
    server
        .shutdown()
        .graceful_shutdown(Some(Duration::from_secs(5)))
        .await;

    let requests = middleware.received_requests().await.unwrap();
    assert!(requests.len() >= 2, "got {} heartbeats", requests.len());
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["id"], "00000000-0000-0000-0000-000000000000");
    assert_eq!(body["batteryLevel"], 100);
}

#[tokio::test]
async fn shutdown_closes_open_sessions() {
    let (url, server) = boot_server().await;
    let (mut ws, _) = open(&url).await;
    let _ = init(&mut ws, 1).await;

    server
        .shutdown()
        .graceful_shutdown(Some(Duration::from_secs(5)))
        .await;

    let closed = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return true,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .unwrap();
    assert!(closed);
    let registry = Arc::clone(server.registry());
    wait_for(|| registry.is_empty()).await;
}
