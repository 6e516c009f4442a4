//! Canonical (protocol-native) message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Default number of delivery retries a message declares.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default acknowledgment timeout in milliseconds.
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 30_000;

/// Delivery status of a canonical message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Sending,
    Sent,
    Delivered,
    Failed,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Requested reliability level.
///
/// Declared on the message; the bridge records it but does not retry on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryGuarantee {
    #[default]
    BestEffort,
    AtLeastOnce,
    ExactlyOnce,
}

/// The protocol-native message routed by the bridge.
///
/// Serialized with camelCase keys; transform rule conditions address these
/// names (`messageType`, `sender`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalMessage {
    pub id: String,
    /// Chain identity of the sender (opaque base58 address).
    pub sender: String,
    pub timestamp: DateTime<Utc>,
    pub payload: String,
    pub message_type: String,
    pub delivery_status: DeliveryStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub requires_ack: bool,
    pub ack_timeout_ms: u64,
    pub delivery_guarantee: DeliveryGuarantee,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl CanonicalMessage {
    /// Creates a message in the `sending` state with default retry/ack settings.
    pub fn new(
        id: impl Into<String>,
        sender: impl Into<String>,
        payload: impl Into<String>,
        message_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            timestamp: Utc::now(),
            payload: payload.into(),
            message_type: message_type.into(),
            delivery_status: DeliveryStatus::Sending,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            requires_ack: false,
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
            delivery_guarantee: DeliveryGuarantee::BestEffort,
            metadata: Map::new(),
        }
    }

    /// Serializes the message into its JSON object shape.
    pub fn to_object(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            // A struct always serializes to an object.
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Ok(map)
            }
        }
    }
}

/// Per-target routing status inside an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Pending,
    Processing,
    Delivered,
    Failed,
}

impl RouteStatus {
    /// `delivered` and `failed` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Delivered | Self::Failed => 2,
        }
    }

    /// Returns `true` if moving from `self` to `next` keeps the status monotonic.
    pub fn can_transition_to(self, next: RouteStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Record of one applied format transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    pub from_format: String,
    pub to_format: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    /// Fields added or changed by the transformation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<Vec<String>>,
}

/// A canonical message after transformation for one target platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub platform_id: String,
    /// Id of the canonical message this was derived from.
    pub canonical_id: String,
    /// Platform-shaped JSON object sent by the adapter.
    pub body: Map<String, Value>,
}

impl OutboundMessage {
    /// Serialized size of the body in bytes.
    pub fn encoded_len(&self) -> Result<usize, serde_json::Error> {
        serde_json::to_vec(&self.body).map(|bytes| bytes.len())
    }

    /// Text content of the message, if the body carries a string payload.
    pub fn content(&self) -> Option<&str> {
        self.body.get("payload").and_then(Value::as_str)
    }
}
