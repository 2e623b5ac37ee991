use arbiter_core::{ArbiterError, ArbiterResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Workflow engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Registry id of the transaction-detail agent.
    #[serde(default = "default_transaction_agent_id")]
    pub transaction_agent_id: String,
    /// Registry id of the dispute-policy agent.
    #[serde(default = "default_policy_agent_id")]
    pub policy_agent_id: String,
    /// Capability that enables the fallback structured query.
    #[serde(default = "default_fallback_capability")]
    pub fallback_capability: String,
    /// Bound on each remote call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Bound on a whole workflow run.
    #[serde(default = "default_workflow_deadline_secs")]
    pub workflow_deadline_secs: u64,
    /// Cap on concurrently running workflows. Unbounded when unset.
    #[serde(default)]
    pub max_concurrent_workflows: Option<usize>,
}

fn default_transaction_agent_id() -> String {
    "Transaction_Detail_Agent".to_string()
}
fn default_policy_agent_id() -> String {
    "Dispute_Policy_Agent".to_string()
}
fn default_fallback_capability() -> String {
    "query_bigquery".to_string()
}
fn default_call_timeout_secs() -> u64 {
    10
}
fn default_workflow_deadline_secs() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transaction_agent_id: default_transaction_agent_id(),
            policy_agent_id: default_policy_agent_id(),
            fallback_capability: default_fallback_capability(),
            call_timeout_secs: default_call_timeout_secs(),
            workflow_deadline_secs: default_workflow_deadline_secs(),
            max_concurrent_workflows: None,
        }
    }
}

impl EngineConfig {
    /// `call_timeout_secs` as a `Duration`.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// `workflow_deadline_secs` as a `Duration`.
    pub fn workflow_deadline(&self) -> Duration {
        Duration::from_secs(self.workflow_deadline_secs)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> ArbiterResult<()> {
        if self.transaction_agent_id.trim().is_empty() || self.policy_agent_id.trim().is_empty() {
            return Err(ArbiterError::Config(
                "engine agent ids must not be empty".to_string(),
            ));
        }
        if self.call_timeout_secs == 0 {
            return Err(ArbiterError::Config(
                "call_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.workflow_deadline_secs == 0 {
            return Err(ArbiterError::Config(
                "workflow_deadline_secs must be > 0".to_string(),
            ));
        }
        if self.max_concurrent_workflows == Some(0) {
            return Err(ArbiterError::Config(
                "max_concurrent_workflows must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}
