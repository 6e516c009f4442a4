//! WebSocket adapter.
//!
//! Opens a full-duplex connection with `tokio-tungstenite`. Outbound messages
//! are written as JSON text frames; a reader task buffers inbound text frames
//! until `receive_messages` drains them.

use crate::adapter::{HealthStatus, InboundMessage, PlatformAdapter, SendOutcome};
use crate::error::AdapterError;
use crate::stats::{AdapterStats, UNHEALTHY_ERROR_RATE};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::{SplitSink, StreamExt};
use futures_util::SinkExt;
use podai_types::{AuthConfig, AuthType, OutboundMessage, PlatformConfig};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

/// Inbound frames kept before the oldest are dropped.
const MAX_BUFFERED_INBOUND: usize = 1024;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

pub struct WebSocketAdapter {
    platform_id: String,
    endpoint: String,
    auth: AuthConfig,
    /// Generation of the live connection, 0 when disconnected.
    connection: Arc<AtomicU64>,
    generation: AtomicU64,
    writer: Mutex<Option<WsSink>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    inbound: Arc<Mutex<VecDeque<InboundMessage>>>,
    stats: Arc<AdapterStats>,
}

impl std::fmt::Debug for WebSocketAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketAdapter")
            .field("platform_id", &self.platform_id)
            .field("endpoint", &self.endpoint)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl WebSocketAdapter {
    pub fn new(config: &PlatformConfig) -> Self {
        Self {
            platform_id: config.platform_id.clone(),
            endpoint: config.connection.endpoint.clone(),
            auth: config.auth.clone(),
            connection: Arc::new(AtomicU64::new(0)),
            generation: AtomicU64::new(0),
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            stats: Arc::new(AdapterStats::default()),
        }
    }

    fn authorization_header(&self) -> Option<String> {
        let creds = &self.auth.credentials;
        match self.auth.auth_type {
            AuthType::Bearer | AuthType::Oauth2 => creds
                .get("token")
                .or_else(|| creds.get("access_token"))
                .map(|t| format!("Bearer {}", t)),
            _ => None,
        }
    }

    async fn write_frame(&self, frame: Message) -> Result<(), AdapterError> {
        let mut writer = self.writer.lock().await;
        let sink = writer
            .as_mut()
            .ok_or_else(|| AdapterError::NotConnected(self.platform_id.clone()))?;
        sink.send(frame).await?;
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for WebSocketAdapter {
    fn platform_id(&self) -> &str {
        &self.platform_id
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        if self.is_connected() {
            return Ok(());
        }

        let mut request = self.endpoint.as_str().into_client_request()?;
        if let Some(value) = self.authorization_header() {
            let header = HeaderValue::from_str(&value)
                .map_err(|e| AdapterError::InvalidConfig(e.to_string()))?;
            request.headers_mut().insert("Authorization", header);
        }

        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| AdapterError::Connection(format!("{}: {}", self.endpoint, e)))?;
        let (sink, mut source) = stream.split();

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.writer.lock().await = Some(sink);
        self.connection.store(generation, Ordering::SeqCst);

        let connection = self.connection.clone();
        let inbound = self.inbound.clone();
        let stats = self.stats.clone();
        let platform_id = self.platform_id.clone();

        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text.as_str().to_string(),
                    Ok(Message::Close(_)) => {
                        tracing::info!(platform = %platform_id, "websocket closed by peer");
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(platform = %platform_id, error = %e, "websocket read error");
                        stats.set_last_error(e.to_string());
                        break;
                    }
                };

                let body = serde_json::from_str::<Value>(&text)
                    .unwrap_or_else(|_| json!({ "payload": text }));
                let mut queue = inbound.lock().await;
                if queue.len() >= MAX_BUFFERED_INBOUND {
                    queue.pop_front();
                    tracing::warn!(platform = %platform_id, "inbound buffer full, dropping oldest frame");
                }
                queue.push_back(InboundMessage {
                    platform_id: platform_id.clone(),
                    received_at: Utc::now(),
                    body,
                });
            }
            // A newer connection may already own the flag.
            let _ = connection.compare_exchange(generation, 0, Ordering::SeqCst, Ordering::SeqCst);
        });

        if let Some(previous) = self.reader.lock().await.replace(reader) {
            previous.abort();
        }
        tracing::info!(platform = %self.platform_id, endpoint = %self.endpoint, "websocket connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        self.connection.store(0, Ordering::SeqCst);
        if let Some(mut sink) = self.writer.lock().await.take() {
            if let Err(e) = sink.close().await {
                tracing::debug!(platform = %self.platform_id, error = %e, "websocket close failed");
            }
        }
        if let Some(reader) = self.reader.lock().await.take() {
            reader.abort();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connection.load(Ordering::SeqCst) != 0
    }

    async fn send_message(&self, message: &OutboundMessage) -> SendOutcome {
        if !self.is_connected() {
            let err = AdapterError::NotConnected(self.platform_id.clone()).to_string();
            self.stats.record_failure(err.clone());
            return SendOutcome::failed(err);
        }

        let text = match serde_json::to_string(&message.body) {
            Ok(text) => text,
            Err(e) => {
                self.stats.record_failure(e.to_string());
                return SendOutcome::failed(e.to_string());
            }
        };

        let started = Instant::now();
        match self.write_frame(Message::text(text)).await {
            Ok(()) => {
                self.stats
                    .record_success(started.elapsed().as_millis() as u64);
                SendOutcome::sent(format!("ws-{}", Uuid::new_v4()))
            }
            Err(e) => {
                tracing::warn!(platform = %self.platform_id, error = %e, "websocket send failed");
                self.stats.record_failure(e.to_string());
                SendOutcome::failed(e.to_string())
            }
        }
    }

    async fn receive_messages(&self) -> Result<Vec<InboundMessage>, AdapterError> {
        Ok(self.inbound.lock().await.drain(..).collect())
    }

    async fn get_health_status(&self) -> HealthStatus {
        let error_rate = self.stats.error_rate();
        HealthStatus {
            is_healthy: self.is_connected() && error_rate < UNHEALTHY_ERROR_RATE,
            latency_ms: self.stats.latency_ms(),
            error_rate,
            last_error: self.stats.last_error(),
        }
    }

    async fn handle_custom_request(
        &self,
        request_type: &str,
        payload: Value,
    ) -> Result<Value, AdapterError> {
        let frame = json!({ "type": request_type, "payload": payload });
        self.write_frame(Message::text(serde_json::to_string(&frame)?))
            .await?;
        Ok(json!({ "sent": true }))
    }
}

impl Drop for WebSocketAdapter {
    fn drop(&mut self) {
        if let Some(handle) = self.reader.get_mut().take() {
            handle.abort();
        }
    }
}
