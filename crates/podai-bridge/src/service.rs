//! The bridge orchestrator.
//!
//! [`BridgeService::send_cross_platform_message`] builds an envelope, queues
//! it and returns at once. A single drain pass at a time walks the queue in
//! FIFO order and delivers each envelope's targets sequentially: transform,
//! size check, rate limit, then the adapter send under a deadline. Failures
//! are recorded on the envelope's routing path and never reach the sender.

use crate::config::BridgeSettings;
use crate::error::BridgeError;
use crate::rate_limit::RateLimiter;
use crate::registry::{PlatformRegistry, RegisteredPlatform};
use crate::tracker::{CrossPlatformEnvelope, EnvelopeReport};
use podai_adapters::{AdapterFactory, HealthStatus};
use podai_directory::{
    AgentDirectory, AgentRegistration, DiscoveryFilters, DiscoveryResult, DirectoryError,
};
use podai_transform::MessageTransformer;
use podai_types::{
    CanonicalMessage, CrossPlatformAgentProfile, DeliveryGuarantee, DeliveryStatus,
    PlatformConfig, PlatformReputation, Transformation,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, Notify};
use tracing::{debug, info, warn};

/// Status reported for every target when a message is accepted.
pub const QUEUED: &str = "queued";

/// Source platform recorded when the caller names none.
pub const DEFAULT_SOURCE_PLATFORM: &str = "bridge";

/// Per-message options of a cross-platform send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendOptions {
    pub source_platform: String,
    pub message_type: String,
    pub requires_ack: bool,
    pub ack_timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub delivery_guarantee: DeliveryGuarantee,
    pub metadata: Map<String, Value>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            source_platform: DEFAULT_SOURCE_PLATFORM.to_string(),
            message_type: "text".to_string(),
            requires_ack: false,
            ack_timeout_ms: None,
            max_retries: None,
            delivery_guarantee: DeliveryGuarantee::BestEffort,
            metadata: Map::new(),
        }
    }
}

/// Returned as soon as a message is queued.
#[derive(Debug)]
pub struct SendReceipt {
    pub envelope_id: String,
    pub message_id: String,
    /// Every target mapped to [`QUEUED`].
    pub statuses: BTreeMap<String, String>,
    /// Resolves once every target is terminal.
    pub completion: oneshot::Receiver<EnvelopeReport>,
}

struct QueuedEnvelope {
    envelope_id: String,
    completion: oneshot::Sender<EnvelopeReport>,
}

/// Completed envelopes, oldest first.
struct History {
    limit: usize,
    order: VecDeque<String>,
    envelopes: HashMap<String, CrossPlatformEnvelope>,
}

impl History {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            order: VecDeque::new(),
            envelopes: HashMap::new(),
        }
    }

    fn push(&mut self, envelope: CrossPlatformEnvelope) {
        if self.limit == 0 {
            return;
        }
        while self.order.len() >= self.limit {
            if let Some(oldest) = self.order.pop_front() {
                self.envelopes.remove(&oldest);
            }
        }
        self.order.push_back(envelope.envelope_id.clone());
        self.envelopes
            .insert(envelope.envelope_id.clone(), envelope);
    }
}

/// Clears the drain flag when a drain pass ends, including by panic.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Outcome of delivering to one target.
struct Delivery {
    transformations: Vec<Transformation>,
    result: Result<String, String>,
}

struct Inner {
    settings: BridgeSettings,
    registry: PlatformRegistry,
    transformer: MessageTransformer,
    directory: AgentDirectory,
    rate_limiter: RateLimiter,
    queue: Mutex<VecDeque<QueuedEnvelope>>,
    in_flight: Mutex<HashMap<String, CrossPlatformEnvelope>>,
    history: Mutex<History>,
    draining: AtomicBool,
    wake: Notify,
}

/// Cheaply clonable handle to the bridge.
#[derive(Clone)]
pub struct BridgeService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for BridgeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeService")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl BridgeService {
    pub fn new(settings: BridgeSettings) -> Self {
        Self::with_components(settings, AdapterFactory::new(), MessageTransformer::default())
    }

    /// Builds a service with a custom adapter factory and transformer.
    pub fn with_components(
        settings: BridgeSettings,
        factory: AdapterFactory,
        transformer: MessageTransformer,
    ) -> Self {
        let default_timeout = Duration::from_millis(settings.default_send_timeout_ms);
        let history = History::new(settings.history_limit);
        Self {
            inner: Arc::new(Inner {
                registry: PlatformRegistry::new(factory, default_timeout),
                transformer,
                directory: AgentDirectory::new(),
                rate_limiter: RateLimiter::new(),
                queue: Mutex::new(VecDeque::new()),
                in_flight: Mutex::new(HashMap::new()),
                history: Mutex::new(history),
                draining: AtomicBool::new(false),
                wake: Notify::new(),
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.inner.settings
    }

    pub fn directory(&self) -> &AgentDirectory {
        &self.inner.directory
    }

    // ---- platform registry ----

    pub async fn register_platform(&self, config: PlatformConfig) -> Result<String, BridgeError> {
        let platform_id = config.platform_id.clone();
        let adapter_id = self.inner.registry.register(config).await?;
        self.inner.rate_limiter.reset(&platform_id);
        Ok(adapter_id)
    }

    pub async fn unregister_platform(&self, platform_id: &str) -> Result<(), BridgeError> {
        self.inner.registry.unregister(platform_id).await?;
        self.inner.rate_limiter.reset(platform_id);
        Ok(())
    }

    pub async fn platforms(&self) -> Vec<String> {
        self.inner.registry.platform_ids().await
    }

    pub async fn platform(&self, platform_id: &str) -> Option<RegisteredPlatform> {
        self.inner.registry.get(platform_id).await
    }

    /// Health of every registered adapter, keyed by platform id.
    pub async fn get_platform_health(&self) -> BTreeMap<String, HealthStatus> {
        let timeout = Duration::from_millis(self.inner.settings.default_send_timeout_ms);
        let mut report = BTreeMap::new();
        for platform in self.inner.registry.entries().await {
            let status =
                match tokio::time::timeout(timeout, platform.adapter.get_health_status()).await {
                    Ok(status) => status,
                    Err(_) => HealthStatus {
                        is_healthy: false,
                        latency_ms: timeout.as_millis() as u64,
                        error_rate: 1.0,
                        last_error: Some("health check timed out".to_string()),
                    },
                };
            report.insert(platform.config.platform_id.clone(), status);
        }
        report
    }

    /// Disconnects every adapter.
    pub async fn shutdown(&self) {
        self.inner.registry.disconnect_all().await;
    }

    // ---- outbound routing ----

    /// Queues `payload` for delivery to `targets` and returns immediately.
    ///
    /// Repeated targets are delivered once. An empty target list completes
    /// at once with a delivered status.
    pub async fn send_cross_platform_message(
        &self,
        sender: &str,
        payload: &str,
        targets: &[String],
        options: SendOptions,
    ) -> SendReceipt {
        let mut message = CanonicalMessage::new(
            uuid::Uuid::new_v4().to_string(),
            sender,
            payload,
            options.message_type,
        );
        message.requires_ack = options.requires_ack;
        message.delivery_guarantee = options.delivery_guarantee;
        message.metadata = options.metadata;
        if let Some(ack_timeout_ms) = options.ack_timeout_ms {
            message.ack_timeout_ms = ack_timeout_ms;
        }
        if let Some(max_retries) = options.max_retries {
            message.max_retries = max_retries;
        }

        let mut seen = HashSet::new();
        let targets: Vec<String> = targets
            .iter()
            .filter(|t| seen.insert(t.as_str()))
            .cloned()
            .collect();

        let envelope_id = uuid::Uuid::new_v4().to_string();
        let message_id = message.id.clone();
        let statuses = targets
            .iter()
            .map(|t| (t.clone(), QUEUED.to_string()))
            .collect();
        let mut envelope = CrossPlatformEnvelope::new(
            envelope_id.clone(),
            message,
            options.source_platform,
            targets,
        );
        let (tx, rx) = oneshot::channel();

        if envelope.is_complete() {
            envelope.finalize();
            let report = envelope.report();
            self.inner.history.lock().await.push(envelope);
            let _ = tx.send(report);
            debug!(envelope = %envelope_id, "envelope with no targets completed");
        } else {
            info!(
                envelope = %envelope_id,
                message = %message_id,
                targets = envelope.tracking.total_targets,
                "queued cross-platform message"
            );
            self.inner
                .in_flight
                .lock()
                .await
                .insert(envelope_id.clone(), envelope);
            self.inner.queue.lock().await.push_back(QueuedEnvelope {
                envelope_id: envelope_id.clone(),
                completion: tx,
            });
            self.inner.wake.notify_one();
        }

        SendReceipt {
            envelope_id,
            message_id,
            statuses,
            completion: rx,
        }
    }

    /// Snapshot of an in-flight or recently completed envelope.
    pub async fn envelope(&self, envelope_id: &str) -> Result<CrossPlatformEnvelope, BridgeError> {
        if let Some(envelope) = self.inner.in_flight.lock().await.get(envelope_id) {
            return Ok(envelope.clone());
        }
        self.inner
            .history
            .lock()
            .await
            .envelopes
            .get(envelope_id)
            .cloned()
            .ok_or_else(|| BridgeError::EnvelopeNotFound(envelope_id.to_string()))
    }

    pub async fn queue_len(&self) -> usize {
        self.inner.queue.lock().await.len()
    }

    /// Resolves when a message is queued.
    pub async fn notified(&self) {
        self.inner.wake.notified().await;
    }

    /// Delivers every queued envelope, oldest first.
    ///
    /// Returns the number of envelopes processed, or 0 immediately if another
    /// drain pass is already running.
    pub async fn drain_queue(&self) -> usize {
        if self
            .inner
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return 0;
        }
        let _guard = DrainGuard(&self.inner.draining);

        let mut processed = 0;
        loop {
            let next = self.inner.queue.lock().await.pop_front();
            let Some(job) = next else {
                break;
            };
            self.process_envelope(job).await;
            processed += 1;
        }
        processed
    }

    async fn process_envelope(&self, job: QueuedEnvelope) {
        let snapshot = {
            let in_flight = self.inner.in_flight.lock().await;
            in_flight
                .get(&job.envelope_id)
                .map(|e| (e.message.clone(), e.target_platforms.clone()))
        };
        let Some((message, targets)) = snapshot else {
            warn!(envelope = %job.envelope_id, "queued envelope missing from in-flight set");
            return;
        };

        for (index, platform_id) in targets.iter().enumerate() {
            self.update_envelope(&job.envelope_id, |env| {
                env.mark_processing(index);
            })
            .await;

            let delivery = self.deliver(&message, platform_id).await;

            match &delivery.result {
                Ok(platform_message_id) => debug!(
                    envelope = %job.envelope_id,
                    platform = %platform_id,
                    platform_message_id = %platform_message_id,
                    "delivered"
                ),
                Err(error) => warn!(
                    envelope = %job.envelope_id,
                    platform = %platform_id,
                    error = %error,
                    "delivery failed"
                ),
            }

            self.update_envelope(&job.envelope_id, |env| {
                env.transformations.extend(delivery.transformations);
                match delivery.result {
                    Ok(id) => env.mark_delivered(index, id),
                    Err(error) => env.mark_failed(index, error),
                };
            })
            .await;
        }

        // An envelope is always in either the in-flight map or history.
        let report = {
            let mut in_flight = self.inner.in_flight.lock().await;
            let Some(mut envelope) = in_flight.remove(&job.envelope_id) else {
                return;
            };
            envelope.finalize();
            info!(
                envelope = %envelope.envelope_id,
                status = %envelope.message.delivery_status,
                successful = envelope.tracking.successful_deliveries,
                failed = envelope.tracking.failed_deliveries,
                "envelope complete"
            );
            let report = envelope.report();
            self.inner.history.lock().await.push(envelope);
            report
        };
        let _ = job.completion.send(report);
    }

    async fn update_envelope<F>(&self, envelope_id: &str, f: F)
    where
        F: FnOnce(&mut CrossPlatformEnvelope),
    {
        if let Some(envelope) = self.inner.in_flight.lock().await.get_mut(envelope_id) {
            f(envelope);
        }
    }

    async fn deliver(&self, message: &CanonicalMessage, platform_id: &str) -> Delivery {
        let mut transformations = Vec::new();
        let result = self
            .try_deliver(message, platform_id, &mut transformations)
            .await
            .map_err(|e| e.to_string());
        Delivery {
            transformations,
            result,
        }
    }

    async fn try_deliver(
        &self,
        message: &CanonicalMessage,
        platform_id: &str,
        transformations: &mut Vec<Transformation>,
    ) -> Result<String, BridgeError> {
        let platform = self
            .inner
            .registry
            .get(platform_id)
            .await
            .ok_or_else(|| BridgeError::AdapterNotFound(platform_id.to_string()))?;
        let config = platform.config.as_ref();

        let output = self
            .inner
            .transformer
            .transform_for_platform(message, platform_id, Some(config))?;
        transformations.extend(output.transformations);

        let size = output.message.encoded_len()?;
        let limit = config.capabilities.max_message_size;
        if size > limit {
            return Err(BridgeError::MessageTooLarge {
                platform: platform_id.to_string(),
                size,
                limit,
            });
        }

        let per_minute = config.rate_limit.requests_per_minute;
        if !self.inner.rate_limiter.check(platform_id, per_minute) {
            return Err(BridgeError::RateLimited {
                platform: platform_id.to_string(),
                limit: per_minute,
            });
        }

        let timeout_ms = config
            .connection
            .timeout_ms
            .unwrap_or(self.inner.settings.default_send_timeout_ms);
        let outcome = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            platform.adapter.send_message(&output.message),
        )
        .await
        .map_err(|_| BridgeError::Timeout {
            platform: platform_id.to_string(),
            timeout_ms,
        })?;

        match outcome.delivery_status {
            DeliveryStatus::Sent | DeliveryStatus::Delivered => Ok(outcome.platform_message_id),
            _ => Err(BridgeError::DeliveryFailed {
                platform: platform_id.to_string(),
                reason: outcome
                    .error
                    .unwrap_or_else(|| "adapter reported failure".to_string()),
            }),
        }
    }

    // ---- inbound ----

    /// Drains every adapter's inbound buffer and renames fields to their
    /// canonical names. Returns `(platform_id, message)` pairs.
    pub async fn poll_inbound(&self) -> Vec<(String, Value)> {
        let timeout = Duration::from_millis(self.inner.settings.default_send_timeout_ms);
        let mut received = Vec::new();
        for platform in self.inner.registry.entries().await {
            let platform_id = platform.config.platform_id.clone();
            let messages =
                match tokio::time::timeout(timeout, platform.adapter.receive_messages()).await {
                    Ok(Ok(messages)) => messages,
                    Ok(Err(e)) => {
                        warn!(platform = %platform_id, error = %e, "receive failed");
                        continue;
                    }
                    Err(_) => {
                        warn!(platform = %platform_id, "receive timed out");
                        continue;
                    }
                };
            for inbound in messages {
                let body = self
                    .inner
                    .transformer
                    .transform_inbound(Some(platform.config.as_ref()), inbound.body);
                received.push((platform_id.clone(), body));
            }
        }
        received
    }

    // ---- agent directory ----

    pub fn register_cross_platform_agent(
        &self,
        registration: AgentRegistration,
    ) -> Result<CrossPlatformAgentProfile, BridgeError> {
        Ok(self.inner.directory.register(registration)?)
    }

    pub fn discover_cross_platform_agents(
        &self,
        filters: &DiscoveryFilters,
        limit: usize,
    ) -> DiscoveryResult {
        self.inner.directory.discover(filters, limit)
    }

    pub fn agent_profile(&self, identity: &str) -> Result<CrossPlatformAgentProfile, BridgeError> {
        self.inner
            .directory
            .get_profile(identity)
            .ok_or_else(|| DirectoryError::AgentNotFound(identity.to_string()).into())
    }

    pub fn record_agent_interaction(
        &self,
        identity: &str,
        platform_id: &str,
        success: bool,
        response_time_ms: f64,
    ) -> Result<PlatformReputation, BridgeError> {
        Ok(self
            .inner
            .directory
            .record_interaction(identity, platform_id, success, response_time_ms)?)
    }
}
