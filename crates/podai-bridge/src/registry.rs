//! Platform registry: configuration plus live adapter per platform id.

use crate::error::BridgeError;
use podai_adapters::{AdapterError, AdapterFactory, PlatformAdapter};
use podai_types::PlatformConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// A registered platform.
#[derive(Clone)]
pub struct RegisteredPlatform {
    pub adapter_id: String,
    pub config: Arc<PlatformConfig>,
    pub adapter: Arc<dyn PlatformAdapter>,
}

impl std::fmt::Debug for RegisteredPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredPlatform")
            .field("adapter_id", &self.adapter_id)
            .field("platform_id", &self.config.platform_id)
            .field("kind", &self.config.kind)
            .field("connected", &self.adapter.is_connected())
            .finish()
    }
}

pub struct PlatformRegistry {
    factory: AdapterFactory,
    /// Deadline for one connect attempt when the platform sets no `timeout_ms`.
    default_timeout: Duration,
    platforms: RwLock<HashMap<String, RegisteredPlatform>>,
}

impl PlatformRegistry {
    pub fn new(factory: AdapterFactory, default_timeout: Duration) -> Self {
        Self {
            factory,
            default_timeout,
            platforms: RwLock::new(HashMap::new()),
        }
    }

    /// Validates `config`, builds and connects its adapter, checks health and
    /// stores it. Returns the generated adapter id.
    ///
    /// A platform id that is already registered has its old adapter
    /// disconnected and replaced.
    pub async fn register(&self, config: PlatformConfig) -> Result<String, BridgeError> {
        config
            .validate()
            .map_err(|source| BridgeError::Configuration {
                platform: config.platform_id.clone(),
                source,
            })?;
        let platform_id = config.platform_id.clone();

        let adapter = self
            .factory
            .build(&config)
            .map_err(|source| BridgeError::Adapter {
                platform: platform_id.clone(),
                source,
            })?;

        self.connect_with_retry(adapter.as_ref(), &config).await?;

        let health = adapter.get_health_status().await;
        if !health.is_healthy {
            if let Err(e) = adapter.disconnect().await {
                warn!(platform = %platform_id, error = %e, "disconnect of unhealthy adapter failed");
            }
            return Err(BridgeError::PlatformUnhealthy {
                platform: platform_id,
                reason: health
                    .last_error
                    .unwrap_or_else(|| "health check failed".to_string()),
            });
        }

        let adapter_id = format!("{}-{}", platform_id, uuid::Uuid::new_v4());

        // Single guard: the id stays mapped and each replaced adapter is
        // handed back exactly once.
        let previous = self.platforms.write().await.insert(
            platform_id.clone(),
            RegisteredPlatform {
                adapter_id: adapter_id.clone(),
                config: Arc::new(config),
                adapter,
            },
        );
        info!(platform = %platform_id, adapter_id = %adapter_id, "platform registered");

        if let Some(previous) = previous {
            info!(
                platform = %platform_id,
                old_adapter = %previous.adapter_id,
                "replaced registered platform"
            );
            if let Err(e) = previous.adapter.disconnect().await {
                warn!(platform = %platform_id, error = %e, "disconnect of replaced adapter failed");
            }
        }
        Ok(adapter_id)
    }

    async fn connect_with_retry(
        &self,
        adapter: &dyn PlatformAdapter,
        config: &PlatformConfig,
    ) -> Result<(), BridgeError> {
        let attempts = config.connection.retry.max_attempts.max(1);
        let timeout = config
            .connection
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.default_timeout);

        let mut last_error = AdapterError::Connection("no attempt made".to_string());
        for attempt in 1..=attempts {
            let result = match tokio::time::timeout(timeout, adapter.connect()).await {
                Ok(result) => result,
                Err(_) => Err(AdapterError::Connection(format!(
                    "connect timed out after {} ms",
                    timeout.as_millis()
                ))),
            };
            match result {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        platform = %config.platform_id,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "platform connect failed"
                    );
                    last_error = e;
                }
            }
            if attempt < attempts {
                let backoff = config.connection.retry.backoff_ms * u64::from(attempt);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }

        Err(BridgeError::ConnectionFailed {
            platform: config.platform_id.clone(),
            attempts,
            source: last_error,
        })
    }

    /// Disconnects and removes a platform.
    pub async fn unregister(&self, platform_id: &str) -> Result<(), BridgeError> {
        let removed = self
            .platforms
            .write()
            .await
            .remove(platform_id)
            .ok_or_else(|| BridgeError::AdapterNotFound(platform_id.to_string()))?;
        if let Err(e) = removed.adapter.disconnect().await {
            warn!(platform = %platform_id, error = %e, "disconnect on unregister failed");
        }
        info!(platform = %platform_id, "platform unregistered");
        Ok(())
    }

    pub async fn get(&self, platform_id: &str) -> Option<RegisteredPlatform> {
        self.platforms.read().await.get(platform_id).cloned()
    }

    /// Registered platform ids, sorted.
    pub async fn platform_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.platforms.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshot of every registered platform, sorted by id.
    pub async fn entries(&self) -> Vec<RegisteredPlatform> {
        let mut entries: Vec<RegisteredPlatform> =
            self.platforms.read().await.values().cloned().collect();
        entries.sort_by(|a, b| a.config.platform_id.cmp(&b.config.platform_id));
        entries
    }

    /// Disconnects and removes every platform.
    pub async fn disconnect_all(&self) {
        let drained: Vec<RegisteredPlatform> =
            self.platforms.write().await.drain().map(|(_, p)| p).collect();
        for platform in drained {
            if let Err(e) = platform.adapter.disconnect().await {
                warn!(platform = %platform.config.platform_id, error = %e, "disconnect failed");
            }
        }
    }
}
