//! Per-envelope routing and delivery accounting.
//!
//! Every target of an envelope owns one [`RoutingEntry`] whose status only
//! moves forward: `pending → processing → delivered | failed`. The
//! aggregate [`DeliveryTracking`] counters always satisfy
//! `successful + failed + pending == total`.

use chrono::{DateTime, Utc};
use podai_types::{CanonicalMessage, DeliveryStatus, RouteStatus, Transformation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Delivery state of one target platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingEntry {
    pub platform_id: String,
    pub status: RouteStatus,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_message_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTracking {
    pub total_targets: usize,
    pub successful_deliveries: usize,
    pub failed_deliveries: usize,
    pub pending_deliveries: usize,
    /// Failed send attempts per platform.
    pub delivery_attempts: HashMap<String, u32>,
}

impl DeliveryTracking {
    pub fn new(total_targets: usize) -> Self {
        Self {
            total_targets,
            pending_deliveries: total_targets,
            ..Default::default()
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.successful_deliveries + self.failed_deliveries + self.pending_deliveries
            == self.total_targets
    }

    pub fn is_complete(&self) -> bool {
        self.pending_deliveries == 0
    }
}

/// One outbound message and its multi-target delivery state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossPlatformEnvelope {
    pub envelope_id: String,
    pub message: CanonicalMessage,
    pub source_platform: String,
    pub target_platforms: Vec<String>,
    pub routing_path: Vec<RoutingEntry>,
    pub transformations: Vec<Transformation>,
    pub tracking: DeliveryTracking,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl CrossPlatformEnvelope {
    pub fn new(
        envelope_id: impl Into<String>,
        message: CanonicalMessage,
        source_platform: impl Into<String>,
        target_platforms: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        let routing_path = target_platforms
            .iter()
            .map(|platform_id| RoutingEntry {
                platform_id: platform_id.clone(),
                status: RouteStatus::Pending,
                updated_at: now,
                error: None,
                platform_message_id: None,
            })
            .collect();
        Self {
            envelope_id: envelope_id.into(),
            message,
            source_platform: source_platform.into(),
            tracking: DeliveryTracking::new(target_platforms.len()),
            target_platforms,
            routing_path,
            transformations: Vec::new(),
            created_at: now,
            completed_at: None,
        }
    }

    /// Moves the entry at `index` to `next`. Returns `false` (and changes
    /// nothing) if the move would not be monotonic.
    fn transition(&mut self, index: usize, next: RouteStatus) -> bool {
        let Some(entry) = self.routing_path.get_mut(index) else {
            return false;
        };
        if !entry.status.can_transition_to(next) {
            tracing::warn!(
                envelope = %self.envelope_id,
                platform = %entry.platform_id,
                from = %entry.status,
                to = %next,
                "rejected non-monotonic routing transition"
            );
            return false;
        }
        entry.status = next;
        entry.updated_at = Utc::now();
        true
    }

    pub fn mark_processing(&mut self, index: usize) -> bool {
        self.transition(index, RouteStatus::Processing)
    }

    pub fn mark_delivered(&mut self, index: usize, platform_message_id: String) -> bool {
        if !self.transition(index, RouteStatus::Delivered) {
            return false;
        }
        self.routing_path[index].platform_message_id = Some(platform_message_id);
        self.tracking.successful_deliveries += 1;
        self.tracking.pending_deliveries -= 1;
        true
    }

    pub fn mark_failed(&mut self, index: usize, error: String) -> bool {
        if !self.transition(index, RouteStatus::Failed) {
            return false;
        }
        let entry = &mut self.routing_path[index];
        entry.error = Some(error);
        *self
            .tracking
            .delivery_attempts
            .entry(entry.platform_id.clone())
            .or_insert(0) += 1;
        self.tracking.failed_deliveries += 1;
        self.tracking.pending_deliveries -= 1;
        true
    }

    pub fn is_complete(&self) -> bool {
        self.tracking.is_complete()
    }

    /// Stamps the final message status once every target is terminal:
    /// `delivered` if all succeeded, `failed` if none did, `sent` otherwise.
    pub fn finalize(&mut self) {
        let tracking = &self.tracking;
        self.message.delivery_status = if tracking.failed_deliveries == 0 {
            DeliveryStatus::Delivered
        } else if tracking.successful_deliveries == 0 {
            DeliveryStatus::Failed
        } else {
            DeliveryStatus::Sent
        };
        self.completed_at = Some(Utc::now());
    }

    pub fn report(&self) -> EnvelopeReport {
        EnvelopeReport {
            envelope_id: self.envelope_id.clone(),
            message_id: self.message.id.clone(),
            status: self.message.delivery_status,
            tracking: self.tracking.clone(),
            routing_path: self.routing_path.clone(),
        }
    }
}

/// Final outcome of an envelope, delivered through the send receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeReport {
    pub envelope_id: String,
    pub message_id: String,
    pub status: DeliveryStatus,
    pub tracking: DeliveryTracking,
    pub routing_path: Vec<RoutingEntry>,
}
