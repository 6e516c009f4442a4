//! Adapter selection by platform kind.

use crate::adapter::PlatformAdapter;
use crate::error::AdapterError;
use crate::generic::GenericAdapter;
use crate::webhook::WebhookAdapter;
use crate::websocket::WebSocketAdapter;
use podai_types::{PlatformConfig, PlatformKind};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds an adapter from a platform configuration.
pub type AdapterBuilder =
    Arc<dyn Fn(&PlatformConfig) -> Result<Arc<dyn PlatformAdapter>, AdapterError> + Send + Sync>;

/// Registry mapping each [`PlatformKind`] to the builder for its adapter.
///
/// Kinds without a builder fall back to [`GenericAdapter`].
#[derive(Clone)]
pub struct AdapterFactory {
    builders: HashMap<PlatformKind, AdapterBuilder>,
}

impl AdapterFactory {
    /// Creates a factory with the built-in adapter for every kind.
    pub fn new() -> Self {
        let mut factory = Self::empty();
        factory.register(PlatformKind::WebSocket, |config| {
            Ok(Arc::new(WebSocketAdapter::new(config)) as Arc<dyn PlatformAdapter>)
        });
        factory.register(PlatformKind::Webhook, |config| {
            Ok(Arc::new(WebhookAdapter::new(config)?) as Arc<dyn PlatformAdapter>)
        });
        factory.register(PlatformKind::Generic, |config| {
            Ok(Arc::new(GenericAdapter::new(config.platform_id.clone())) as Arc<dyn PlatformAdapter>)
        });
        factory
    }

    /// Creates a factory with no builders; every kind resolves to the generic adapter.
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Installs (or replaces) the builder for `kind`.
    pub fn register<F>(&mut self, kind: PlatformKind, builder: F)
    where
        F: Fn(&PlatformConfig) -> Result<Arc<dyn PlatformAdapter>, AdapterError>
            + Send
            + Sync
            + 'static,
    {
        self.builders.insert(kind, Arc::new(builder));
    }

    /// Builder-style variant of [`AdapterFactory::register`].
    pub fn with<F>(mut self, kind: PlatformKind, builder: F) -> Self
    where
        F: Fn(&PlatformConfig) -> Result<Arc<dyn PlatformAdapter>, AdapterError>
            + Send
            + Sync
            + 'static,
    {
        self.register(kind, builder);
        self
    }

    pub fn build(&self, config: &PlatformConfig) -> Result<Arc<dyn PlatformAdapter>, AdapterError> {
        match self.builders.get(&config.kind) {
            Some(builder) => builder(config),
            None => {
                tracing::debug!(
                    platform = %config.platform_id,
                    kind = %config.kind,
                    "no adapter builder for kind, using generic adapter"
                );
                Ok(Arc::new(GenericAdapter::new(config.platform_id.clone())))
            }
        }
    }
}

impl Default for AdapterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AdapterFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<&PlatformKind> = self.builders.keys().collect();
        f.debug_struct("AdapterFactory").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_generic_for_generic_kind() {
        let factory = AdapterFactory::new();
        let config = PlatformConfig::new("loopback", PlatformKind::Generic, "memory://");
        let adapter = factory.build(&config).unwrap();
        assert_eq!(adapter.platform_id(), "loopback");
        assert!(!adapter.is_connected());
    }

    #[tokio::test]
    async fn empty_factory_falls_back_to_generic() {
        let factory = AdapterFactory::empty();
        let config = PlatformConfig::new("ws", PlatformKind::WebSocket, "ws://127.0.0.1:1");
        let adapter = factory.build(&config).unwrap();
        adapter.connect().await.unwrap();
        assert!(adapter.is_connected());
    }

    #[tokio::test]
    async fn registered_builder_overrides_default() {
        let factory = AdapterFactory::new().with(PlatformKind::WebSocket, |config| {
            Ok(Arc::new(GenericAdapter::new(format!("mock-{}", config.platform_id)))
                as Arc<dyn PlatformAdapter>)
        });
        let config = PlatformConfig::new("discord", PlatformKind::WebSocket, "wss://gateway");
        let adapter = factory.build(&config).unwrap();
        assert_eq!(adapter.platform_id(), "mock-discord");
    }
}
