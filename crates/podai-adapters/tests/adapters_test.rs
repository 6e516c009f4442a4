//! Adapter tests against loopback axum servers.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use podai_adapters::{PlatformAdapter, WebSocketAdapter, WebhookAdapter};
use podai_types::{AuthType, OutboundMessage, PlatformConfig, PlatformKind};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct HookState {
    bodies: Arc<Mutex<Vec<Value>>>,
    auth_headers: Arc<Mutex<Vec<String>>>,
}

async fn hook_handler(
    State(state): State<HookState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    if let Some(auth) = headers.get("authorization") {
        state
            .auth_headers
            .lock()
            .unwrap()
            .push(auth.to_str().unwrap().to_string());
    }
    state.bodies.lock().unwrap().push(body);
    Json(json!({ "id": "hook-1" }))
}

async fn failing_handler() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "nope")
}

async fn echo_ws(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(|mut socket: WebSocket| async move {
        while let Some(Ok(msg)) = socket.recv().await {
            if let WsMessage::Text(text) = msg {
                if socket.send(WsMessage::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    })
}

async fn closing_ws(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(|mut socket: WebSocket| async move {
        let _ = socket.send(WsMessage::Close(None)).await;
    })
}

async fn spawn_server(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr.to_string()
}

fn outbound(platform: &str, payload: &str) -> OutboundMessage {
    let mut body = Map::new();
    body.insert("id".to_string(), json!("m-1"));
    body.insert("payload".to_string(), json!(payload));
    OutboundMessage {
        platform_id: platform.to_string(),
        canonical_id: "m-1".to_string(),
        body,
    }
}

#[tokio::test]
async fn test_webhook_posts_body_with_bearer_auth() {
    let state = HookState::default();
    let app = Router::new()
        .route("/hook", post(hook_handler))
        .with_state(state.clone());
    let addr = spawn_server(app).await;

    let mut config = PlatformConfig::new(
        "hooks",
        PlatformKind::Webhook,
        format!("http://{}/hook", addr),
    );
    config.auth.auth_type = AuthType::Bearer;
    config
        .auth
        .credentials
        .insert("token".to_string(), "secret-token".to_string());

    let adapter = WebhookAdapter::new(&config).unwrap();
    adapter.connect().await.unwrap();

    let outcome = adapter.send_message(&outbound("hooks", "hello")).await;
    assert!(outcome.is_sent(), "unexpected outcome: {:?}", outcome);
    assert_eq!(outcome.platform_message_id, "hook-1");

    let bodies = state.bodies.lock().unwrap().clone();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["payload"], "hello");
    assert_eq!(
        state.auth_headers.lock().unwrap().clone(),
        vec!["Bearer secret-token".to_string()]
    );

    let health = adapter.get_health_status().await;
    assert!(health.is_healthy);
    assert_eq!(health.error_rate, 0.0);
}

#[tokio::test]
async fn test_webhook_failure_is_reported_not_raised() {
    let app = Router::new().route("/hook", post(failing_handler));
    let addr = spawn_server(app).await;

    let config = PlatformConfig::new(
        "hooks",
        PlatformKind::Webhook,
        format!("http://{}/hook", addr),
    );
    let adapter = WebhookAdapter::new(&config).unwrap();

    let outcome = adapter.send_message(&outbound("hooks", "hello")).await;
    assert!(!outcome.is_sent());
    assert!(outcome.platform_message_id.is_empty());
    assert!(outcome.error.unwrap().contains("HTTP 500"));

    let health = adapter.get_health_status().await;
    assert!(!health.is_healthy);
    assert_eq!(health.error_rate, 1.0);
    assert!(health.last_error.is_some());
}

#[tokio::test]
async fn test_websocket_send_and_receive() {
    let app = Router::new().route("/ws", get(echo_ws));
    let addr = spawn_server(app).await;

    let config = PlatformConfig::new("echo", PlatformKind::WebSocket, format!("ws://{}/ws", addr));
    let adapter = WebSocketAdapter::new(&config);

    // Sending before connecting fails without raising.
    let outcome = adapter.send_message(&outbound("echo", "early")).await;
    assert!(!outcome.is_sent());

    adapter.connect().await.unwrap();
    assert!(adapter.is_connected());

    let outcome = adapter.send_message(&outbound("echo", "ping")).await;
    assert!(outcome.is_sent());
    assert!(outcome.platform_message_id.starts_with("ws-"));

    let mut received = Vec::new();
    for _ in 0..50 {
        received.extend(adapter.receive_messages().await.unwrap());
        if !received.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].platform_id, "echo");
    assert_eq!(received[0].body["payload"], "ping");

    adapter.disconnect().await.unwrap();
    assert!(!adapter.is_connected());
    assert!(!adapter.get_health_status().await.is_healthy);
}

#[tokio::test]
async fn test_websocket_peer_close_clears_connection() {
    let app = Router::new().route("/ws", get(closing_ws));
    let addr = spawn_server(app).await;

    let config = PlatformConfig::new("flaky", PlatformKind::WebSocket, format!("ws://{}/ws", addr));
    let adapter = WebSocketAdapter::new(&config);

    for _ in 0..2 {
        adapter.connect().await.unwrap();
        for _ in 0..50 {
            if !adapter.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!adapter.is_connected());
        assert!(!adapter.send_message(&outbound("flaky", "late")).await.is_sent());
    }
}

#[tokio::test]
async fn test_websocket_connect_failure() {
    // Bind then drop to obtain a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = PlatformConfig::new("dead", PlatformKind::WebSocket, format!("ws://{}/ws", addr));
    let adapter = WebSocketAdapter::new(&config);
    assert!(adapter.connect().await.is_err());
    assert!(!adapter.is_connected());
}
