//! The capability set every platform integration implements.

use crate::error::AdapterError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use podai_types::{DeliveryStatus, OutboundMessage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a single send attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendOutcome {
    /// Id assigned by the platform; empty when the send failed.
    pub platform_message_id: String,
    pub delivery_status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn sent(platform_message_id: impl Into<String>) -> Self {
        Self {
            platform_message_id: platform_message_id.into(),
            delivery_status: DeliveryStatus::Sent,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            platform_message_id: String::new(),
            delivery_status: DeliveryStatus::Failed,
            error: Some(error.into()),
        }
    }

    pub fn is_sent(&self) -> bool {
        self.delivery_status == DeliveryStatus::Sent
    }
}

/// Health snapshot of one adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub latency_ms: u64,
    pub error_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// A message pulled from a platform, still in the platform's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub platform_id: String,
    pub received_at: DateTime<Utc>,
    pub body: Value,
}

/// Presence state of an external account on a platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceInfo {
    pub external_id: String,
    pub online: bool,
    pub last_seen: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
}

/// Connection to one external platform.
///
/// Implementations use interior mutability so a single adapter can be shared
/// as `Arc<dyn PlatformAdapter>` between the delivery loop and the health
/// monitor.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Platform id this adapter was built for.
    fn platform_id(&self) -> &str;

    async fn connect(&self) -> Result<(), AdapterError>;

    async fn disconnect(&self) -> Result<(), AdapterError>;

    fn is_connected(&self) -> bool;

    /// Sends one message. Never fails: errors are reported as a `failed` outcome.
    async fn send_message(&self, message: &OutboundMessage) -> SendOutcome;

    /// Drains messages received since the last call.
    async fn receive_messages(&self) -> Result<Vec<InboundMessage>, AdapterError>;

    async fn get_health_status(&self) -> HealthStatus;

    async fn update_presence(&self, _presence: PresenceInfo) -> Result<(), AdapterError> {
        Err(AdapterError::Unsupported("update_presence"))
    }

    async fn get_presence(&self, _external_id: &str) -> Result<Option<PresenceInfo>, AdapterError> {
        Err(AdapterError::Unsupported("get_presence"))
    }

    /// Platform-specific escape hatch (e.g. agent registration).
    async fn handle_custom_request(
        &self,
        _request_type: &str,
        _payload: Value,
    ) -> Result<Value, AdapterError> {
        Err(AdapterError::Unsupported("handle_custom_request"))
    }
}
