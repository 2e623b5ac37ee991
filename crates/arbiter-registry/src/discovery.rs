use crate::store::{normalize_base_url, RegistryStore};
use arbiter_core::{AgentDescriptor, AgentDirectory, ArbiterResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Read-only view over the registry.
///
/// Every answer is a copy taken under the store's read lock; nothing here
/// awaits or touches the network.
#[derive(Clone)]
pub struct DiscoveryService {
    store: Arc<RegistryStore>,
}

impl DiscoveryService {
    /// Wrap a store.
    pub fn new(store: Arc<RegistryStore>) -> Self {
        Self { store }
    }

    /// All configured agents, or only the active ones. Sorted by id so
    /// repeated calls list agents in a stable order.
    pub fn list(&self, only_active: bool) -> Vec<AgentDescriptor> {
        let mut agents: Vec<AgentDescriptor> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|d| !only_active || d.is_active())
            .collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.base_url.cmp(&b.base_url)));
        agents
    }

    /// Look an agent up by advertised id, falling back to its base URL.
    pub fn get(&self, id: &str) -> Option<AgentDescriptor> {
        let snapshot = self.store.snapshot();
        let key = normalize_base_url(id);
        snapshot
            .iter()
            .find(|d| d.id == id)
            .or_else(|| snapshot.iter().find(|d| d.base_url == key))
            .cloned()
    }

    /// Size of the catalog, regardless of status.
    pub fn catalog_size(&self) -> usize {
        self.store.len()
    }
}

#[async_trait]
impl AgentDirectory for DiscoveryService {
    async fn active_agents(&self) -> ArbiterResult<Vec<AgentDescriptor>> {
        Ok(self.list(true))
    }
}
