use std::sync::Arc;

use cdc_api::Broker;

use crate::config::BridgeConfig;
use crate::drain::DrainCoordinator;
use crate::error::EngineError;
use crate::publisher::Publisher;
use crate::router::{self, Route};
use crate::topic::TopicRegistry;

/// Per-process bridge state shared by every request.
pub struct Bridge {
    config: BridgeConfig,
    registry: Arc<TopicRegistry>,
    publisher: Publisher,
    drain: DrainCoordinator,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("drain", &self.drain)
            .finish()
    }
}

impl Bridge {
    /// Validate the configuration and wire the bridge around a broker.
    pub fn new(config: BridgeConfig, broker: Arc<dyn Broker>) -> Result<Self, EngineError> {
        config.validate()?;

        let registry = Arc::new(TopicRegistry::new(broker));
        let publisher = Publisher::new(registry.clone(), config.topic_prefix.clone(), config.max_line_bytes);

        tracing::info!(
            prefix = %config.mount_prefix(),
            topic_prefix = %config.topic_prefix,
            shared_keys = config.shared_keys.len(),
            "bridge configured"
        );

        Ok(Self {
            config,
            registry,
            publisher,
            drain: DrainCoordinator::new(),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TopicRegistry> {
        &self.registry
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn drain(&self) -> &DrainCoordinator {
        &self.drain
    }

    /// Route a full request path, mount prefix included.
    pub fn route(&self, path: &str) -> Option<Route> {
        router::strip_prefix(self.config.mount_prefix(), path).and_then(router::route)
    }
}
