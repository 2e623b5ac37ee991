use arbiter_core::AgentDescriptor;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Trim whitespace and trailing slashes so `http://a/` and `http://a` name the
/// same registry slot.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Process-wide map of configured agents.
///
/// Slots are keyed by normalized base URL and created once, from
/// configuration. Each slot holds an immutable descriptor behind an `Arc`;
/// writers replace the whole `Arc`, so a reader either sees the old
/// descriptor or the new one, never a mix.
pub struct RegistryStore {
    entries: RwLock<HashMap<String, Arc<AgentDescriptor>>>,
    failure_threshold: u32,
}

impl RegistryStore {
    /// Create one unprobed slot per configured URL. Duplicate URLs collapse
    /// into one slot.
    pub fn from_urls<I, S>(urls: I, failure_threshold: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = urls
            .into_iter()
            .map(|u| normalize_base_url(u.as_ref()))
            .filter(|u| !u.is_empty())
            .map(|key| {
                let descriptor = AgentDescriptor::unprobed(key.clone(), failure_threshold);
                (key, Arc::new(descriptor))
            })
            .collect();

        Self {
            entries: RwLock::new(entries),
            failure_threshold,
        }
    }

    /// Threshold the stored statuses are derived with.
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Slot keys (normalized base URLs), in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// The descriptor currently published in a slot.
    pub fn current(&self, key: &str) -> Option<Arc<AgentDescriptor>> {
        self.entries.read().get(key).cloned()
    }

    /// Replace the descriptor in an existing slot. Unknown keys are ignored:
    /// the set of slots is fixed at construction.
    pub(crate) fn publish(&self, key: &str, descriptor: AgentDescriptor) -> bool {
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(slot) => {
                *slot = Arc::new(descriptor);
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of every descriptor.
    pub fn snapshot(&self) -> Vec<AgentDescriptor> {
        let published: Vec<Arc<AgentDescriptor>> =
            self.entries.read().values().cloned().collect();
        published.iter().map(|d| (**d).clone()).collect()
    }

    /// Number of configured agents.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no agent is configured.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
