//! In-process loopback adapter.
//!
//! Used as the safe default for platforms without a dedicated transport. Sent
//! messages land in a bounded outbox, inbound messages are injected with
//! [`GenericAdapter::push_inbound`], and presence lives in memory.

use crate::adapter::{HealthStatus, InboundMessage, PlatformAdapter, PresenceInfo, SendOutcome};
use crate::error::AdapterError;
use crate::stats::{AdapterStats, UNHEALTHY_ERROR_RATE};
use async_trait::async_trait;
use chrono::Utc;
use podai_types::OutboundMessage;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Sent and inbound messages kept per adapter; the oldest are dropped first.
pub const MAX_BUFFERED_MESSAGES: usize = 1024;

#[derive(Debug)]
pub struct GenericAdapter {
    platform_id: String,
    connected: AtomicBool,
    outbox: Mutex<VecDeque<OutboundMessage>>,
    inbound: Mutex<VecDeque<InboundMessage>>,
    presence: Mutex<HashMap<String, PresenceInfo>>,
    stats: AdapterStats,
}

impl GenericAdapter {
    pub fn new(platform_id: impl Into<String>) -> Self {
        Self {
            platform_id: platform_id.into(),
            connected: AtomicBool::new(false),
            outbox: Mutex::new(VecDeque::new()),
            inbound: Mutex::new(VecDeque::new()),
            presence: Mutex::new(HashMap::new()),
            stats: AdapterStats::default(),
        }
    }

    /// Queues a message to be returned by the next `receive_messages` call.
    pub async fn push_inbound(&self, body: Value) {
        let mut inbound = self.inbound.lock().await;
        if inbound.len() >= MAX_BUFFERED_MESSAGES {
            inbound.pop_front();
        }
        inbound.push_back(InboundMessage {
            platform_id: self.platform_id.clone(),
            received_at: Utc::now(),
            body,
        });
    }

    /// The most recent messages sent through this adapter, oldest first.
    pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.outbox.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl PlatformAdapter for GenericAdapter {
    fn platform_id(&self) -> &str {
        &self.platform_id
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!(platform = %self.platform_id, "generic adapter connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_message(&self, message: &OutboundMessage) -> SendOutcome {
        if !self.is_connected() {
            let err = AdapterError::NotConnected(self.platform_id.clone()).to_string();
            self.stats.record_failure(err.clone());
            return SendOutcome::failed(err);
        }
        {
            let mut outbox = self.outbox.lock().await;
            if outbox.len() >= MAX_BUFFERED_MESSAGES {
                outbox.pop_front();
            }
            outbox.push_back(message.clone());
        }
        self.stats.record_success(0);
        SendOutcome::sent(format!("generic-{}", Uuid::new_v4()))
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

    async fn update_presence(&self, presence: PresenceInfo) -> Result<(), AdapterError> {
        self.presence
            .lock()
            .await
            .insert(presence.external_id.clone(), presence);
        Ok(())
    }

    async fn get_presence(&self, external_id: &str) -> Result<Option<PresenceInfo>, AdapterError> {
        Ok(self.presence.lock().await.get(external_id).cloned())
    }

    async fn handle_custom_request(
        &self,
        request_type: &str,
        payload: Value,
    ) -> Result<Value, AdapterError> {
        Ok(json!({
            "accepted": true,
            "type": request_type,
            "payload": payload,
        }))
    }
}
