//! HTTP webhook adapter.
//!
//! Stateless: the adapter is always considered connected and every send is a
//! single JSON `POST` to the configured endpoint.

use crate::adapter::{HealthStatus, InboundMessage, PlatformAdapter, SendOutcome};
use crate::error::AdapterError;
use crate::stats::{AdapterStats, UNHEALTHY_ERROR_RATE};
use async_trait::async_trait;
use podai_types::{AuthConfig, AuthType, OutboundMessage, PlatformConfig};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Request timeout used when the platform config does not set one.
const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Header used for `api_key` auth when the credentials do not name one.
const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug)]
pub struct WebhookAdapter {
    platform_id: String,
    endpoint: String,
    auth: AuthConfig,
    client: reqwest::Client,
    stats: AdapterStats,
}

impl WebhookAdapter {
    pub fn new(config: &PlatformConfig) -> Result<Self, AdapterError> {
        let timeout = config
            .connection
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_WEBHOOK_TIMEOUT);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            platform_id: config.platform_id.clone(),
            endpoint: config.connection.endpoint.clone(),
            auth: config.auth.clone(),
            client,
            stats: AdapterStats::default(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let creds = &self.auth.credentials;
        match self.auth.auth_type {
            AuthType::None => request,
            AuthType::Bearer => match creds.get("token") {
                Some(token) => request.bearer_auth(token),
                None => request,
            },
            AuthType::Oauth2 => match creds.get("access_token").or_else(|| creds.get("token")) {
                Some(token) => request.bearer_auth(token),
                None => request,
            },
            AuthType::ApiKey => match creds.get("api_key") {
                Some(key) => {
                    let header = creds
                        .get("header")
                        .map(String::as_str)
                        .unwrap_or(DEFAULT_API_KEY_HEADER);
                    request.header(header, key)
                }
                None => request,
            },
            AuthType::Basic => match creds.get("username") {
                Some(user) => request.basic_auth(user, creds.get("password")),
                None => request,
            },
        }
    }

    async fn post(&self, body: &Value) -> Result<Value, AdapterError> {
        let response = self
            .authorize(self.client.post(&self.endpoint))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AdapterError::Connection(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                self.platform_id,
                text
            )));
        }

        // Webhooks commonly answer with an empty body.
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

/// Extracts a message id from a webhook response, if the platform returned one.
fn response_message_id(response: &Value) -> Option<String> {
    ["id", "messageId", "message_id"]
        .iter()
        .find_map(|key| match response.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
}

#[async_trait]
impl PlatformAdapter for WebhookAdapter {
    fn platform_id(&self) -> &str {
        &self.platform_id
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        tracing::debug!(platform = %self.platform_id, endpoint = %self.endpoint, "webhook adapter ready");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn send_message(&self, message: &OutboundMessage) -> SendOutcome {
        let started = Instant::now();
        let body = Value::Object(message.body.clone());

        match self.post(&body).await {
            Ok(response) => {
                self.stats
                    .record_success(started.elapsed().as_millis() as u64);
                let id = response_message_id(&response)
                    .unwrap_or_else(|| format!("webhook-{}", Uuid::new_v4()));
                SendOutcome::sent(id)
            }
            Err(e) => {
                tracing::warn!(platform = %self.platform_id, error = %e, "webhook send failed");
                self.stats.record_failure(e.to_string());
                SendOutcome::failed(e.to_string())
            }
        }
    }

    async fn receive_messages(&self) -> Result<Vec<InboundMessage>, AdapterError> {
        // Webhook platforms push inbound traffic to the bridge, nothing to pull.
        Ok(Vec::new())
    }

    async fn get_health_status(&self) -> HealthStatus {
        let error_rate = self.stats.error_rate();
        HealthStatus {
            is_healthy: error_rate < UNHEALTHY_ERROR_RATE,
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
        self.post(&json!({ "type": request_type, "payload": payload }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_message_ids() {
        assert_eq!(
            response_message_id(&json!({"id": "abc"})).as_deref(),
            Some("abc")
        );
        assert_eq!(
            response_message_id(&json!({"messageId": 42})).as_deref(),
            Some("42")
        );
        assert_eq!(
            response_message_id(&json!({"message_id": "m-9"})).as_deref(),
            Some("m-9")
        );
        assert_eq!(response_message_id(&json!({"id": ""})), None);
        assert_eq!(response_message_id(&Value::Null), None);
    }

    #[test]
    fn is_always_connected() {
        let config = PlatformConfig::new(
            "hooks",
            podai_types::PlatformKind::Webhook,
            "http://127.0.0.1:9/hook",
        );
        let adapter = WebhookAdapter::new(&config).unwrap();
        assert!(adapter.is_connected());
        assert_eq!(adapter.platform_id(), "hooks");
    }
}
