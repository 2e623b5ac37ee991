//! Agent registry with liveness polling.
//!
//! One [`RegistryStore`] slot exists per configured agent URL for the whole
//! life of the process. Each slot is written by exactly one
//! [`LivenessPoller`], which fetches the agent's self-description on a fixed
//! interval and derives the slot's status from its consecutive failure count.
//! Consumers read through [`DiscoveryService`], which only ever hands out
//! copies.

/// Registry and poller configuration.
pub mod config;
/// Read-only discovery queries.
pub mod discovery;
/// Per-agent liveness pollers.
pub mod poller;
/// The registry store.
pub mod store;
/// Bearer-token sources for probes.
pub mod token;

pub use config::{ProbeAuthConfig, RegistryConfig, DEFAULT_WELL_KNOWN_PATH};
pub use discovery::DiscoveryService;
pub use poller::{LivenessPoller, PollerGroup, PollerHandle, ProbeError};
pub use store::RegistryStore;
pub use token::{provider_from_config, MetadataServerToken, NoAuth, StaticToken, TokenProvider};

use arbiter_core::ArbiterResult;
use std::sync::Arc;

/// A running registry: store, discovery view and pollers.
pub struct Registry {
    store: Arc<RegistryStore>,
    discovery: DiscoveryService,
    pollers: PollerGroup,
}

impl Registry {
    /// Validate the configuration, create the slots and start polling.
    pub fn start(config: &RegistryConfig) -> ArbiterResult<Self> {
        config.validate()?;
        let tokens = provider_from_config(&config.auth, config.probe_timeout())?;
        Self::start_with_tokens(config, tokens)
    }

    /// Like [`Registry::start`] with an explicit token source.
    pub fn start_with_tokens(
        config: &RegistryConfig,
        tokens: Arc<dyn TokenProvider>,
    ) -> ArbiterResult<Self> {
        config.validate()?;
        let store = Arc::new(RegistryStore::from_urls(
            &config.agent_urls,
            config.failure_threshold,
        ));
        if store.is_empty() {
            tracing::warn!("No agent URLs configured; the registry will stay empty");
        }
        let pollers = PollerGroup::start(config, store.clone(), tokens)?;
        Ok(Self {
            discovery: DiscoveryService::new(store.clone()),
            store,
            pollers,
        })
    }

    /// Discovery view over this registry.
    pub fn discovery(&self) -> DiscoveryService {
        self.discovery.clone()
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<RegistryStore> {
        &self.store
    }

    /// Stop all pollers. The store stays readable.
    pub async fn shutdown(self) {
        self.pollers.shutdown().await;
    }
}
