use crate::config::EngineConfig;
use arbiter_core::AgentDescriptor;

/// A resolved agent: who to call and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentBinding {
    /// Advertised agent id.
    pub id: String,
    /// Base URL operations are resolved against.
    pub base_url: String,
}

impl From<&AgentDescriptor> for AgentBinding {
    fn from(descriptor: &AgentDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            base_url: descriptor.base_url.clone(),
        }
    }
}

/// The agents one workflow run talks to, fixed at `DISCOVERING`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentBindings {
    /// Transaction-detail agent.
    pub transaction: AgentBinding,
    /// Dispute-policy agent.
    pub policy: AgentBinding,
    /// Whether the transaction agent advertises the fallback query.
    pub fallback_supported: bool,
}

impl AgentBindings {
    /// Resolve both required agents from an active-agent snapshot.
    ///
    /// Entries that are not active are ignored even if present. The error
    /// names every agent that could not be resolved.
    pub fn resolve(agents: &[AgentDescriptor], config: &EngineConfig) -> Result<Self, String> {
        let find = |id: &str| agents.iter().find(|a| a.id == id && a.is_active());

        let transaction = find(&config.transaction_agent_id);
        let policy = find(&config.policy_agent_id);

        match (transaction, policy) {
            (Some(transaction), Some(policy)) => Ok(Self {
                fallback_supported: transaction.has_capability(&config.fallback_capability),
                transaction: transaction.into(),
                policy: policy.into(),
            }),
            (transaction, policy) => {
                let missing: Vec<&str> = [
                    (transaction.is_none(), config.transaction_agent_id.as_str()),
                    (policy.is_none(), config.policy_agent_id.as_str()),
                ]
                .into_iter()
                .filter_map(|(absent, id)| absent.then_some(id))
                .collect();
                Err(format!(
                    "required agents not active: {} ({} active agents known)",
                    missing.join(", "),
                    agents.len()
                ))
            }
        }
    }
}
