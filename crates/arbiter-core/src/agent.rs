use crate::{ArbiterError, ArbiterResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Liveness of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Recent probes succeeded; the agent can be used by workflows.
    Active,
    /// The agent failed `threshold` consecutive probes (or was never reached).
    Inactive,
}

impl AgentStatus {
    /// Derive the status from a failure count. This is the only way a status
    /// is ever produced for a registered agent.
    pub fn from_failures(consecutive_failures: u32, threshold: u32) -> Self {
        if consecutive_failures >= threshold {
            AgentStatus::Inactive
        } else {
            AgentStatus::Active
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Active => write!(f, "active"),
            AgentStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// One capability advertised in an agent's self-description.
///
/// Agents publish either a bare identifier or an object carrying the
/// identifier and a reference to its formal API definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CapabilityRepr")]
pub struct CapabilityRef {
    /// Capability identifier, e.g. `get_transaction_details`.
    pub id: String,
    /// Where the formal API definition of this capability lives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_ref: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CapabilityRepr {
    Bare(String),
    Detailed {
        #[serde(alias = "name", alias = "operation_id")]
        id: String,
        #[serde(default, alias = "api_definition", alias = "openapi", alias = "url")]
        api_ref: Option<String>,
    },
}

impl From<CapabilityRepr> for CapabilityRef {
    fn from(repr: CapabilityRepr) -> Self {
        match repr {
            CapabilityRepr::Bare(id) => Self { id, api_ref: None },
            CapabilityRepr::Detailed { id, api_ref } => Self { id, api_ref },
        }
    }
}

/// The self-description document an agent serves at its well-known path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    /// Stable logical identity of the agent.
    #[serde(default)]
    pub id: String,
    /// Human-readable name.
    #[serde(default, alias = "name")]
    pub display_name: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Capabilities in advertised order.
    #[serde(default)]
    pub capabilities: Vec<CapabilityRef>,
    /// Link to the agent's full API definition, if published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities_url: Option<String>,
}

impl AgentCard {
    /// Parse and validate a self-description body.
    ///
    /// A document without an `id` is treated as unparseable.
    pub fn parse(body: &[u8]) -> ArbiterResult<Self> {
        let card: AgentCard = serde_json::from_slice(body)?;
        if card.id.trim().is_empty() {
            return Err(ArbiterError::Registry(
                "agent self-description is missing 'id'".to_string(),
            ));
        }
        Ok(card)
    }
}

/// Identity and liveness record for one remote agent.
///
/// Descriptors are values: a poller never mutates a published descriptor in
/// place, it derives a new one with [`AgentDescriptor::with_success`] or
/// [`AgentDescriptor::with_failure`] and publishes it whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Advertised identity. Until the first successful probe this is the
    /// configured base URL.
    pub id: String,
    /// Network address at which the agent is reachable.
    pub base_url: String,
    /// Informational display name.
    #[serde(default, alias = "name")]
    pub display_name: Option<String>,
    /// Informational description.
    #[serde(default)]
    pub description: Option<String>,
    /// Capability identifiers in advertised order.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Link to the agent's full API definition, if published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities_url: Option<String>,
    /// Derived liveness.
    pub status: AgentStatus,
    /// Number of consecutive failed probes.
    ///
    /// An agent that has never answered starts at the failure threshold,
    /// so before the first success this count is the threshold plus the
    /// failed probes since startup. The first successful probe resets it.
    #[serde(default)]
    pub consecutive_failures: u32,
    /// When the agent was last probed, whatever the outcome.
    #[serde(default)]
    pub last_checked_at: Option<DateTime<Utc>>,
    /// When the last successful probe happened.
    #[serde(default, alias = "last_seen")]
    pub last_success_at: Option<DateTime<Utc>>,
    /// The last self-description body observed, verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_card: Option<serde_json::Value>,
}

impl AgentDescriptor {
    /// A descriptor for a configured URL that has not been probed yet.
    ///
    /// The failure count starts at the threshold, so the agent is reported
    /// inactive until its first successful probe.
    pub fn unprobed(base_url: impl Into<String>, threshold: u32) -> Self {
        let base_url = base_url.into();
        Self {
            id: base_url.clone(),
            base_url,
            display_name: None,
            description: None,
            capabilities: Vec::new(),
            capabilities_url: None,
            status: AgentStatus::from_failures(threshold, threshold),
            consecutive_failures: threshold,
            last_checked_at: None,
            last_success_at: None,
            raw_card: None,
        }
    }

    /// Derive the descriptor that follows a successful probe.
    pub fn with_success(
        &self,
        card: &AgentCard,
        raw: serde_json::Value,
        now: DateTime<Utc>,
        threshold: u32,
    ) -> Self {
        Self {
            id: card.id.clone(),
            base_url: self.base_url.clone(),
            display_name: card.display_name.clone(),
            description: card.description.clone(),
            capabilities: card.capabilities.iter().map(|c| c.id.clone()).collect(),
            capabilities_url: card.capabilities_url.clone(),
            status: AgentStatus::from_failures(0, threshold),
            consecutive_failures: 0,
            last_checked_at: Some(now),
            last_success_at: Some(now),
            raw_card: Some(raw),
        }
    }

    /// Derive the descriptor that follows a failed probe. Metadata from the
    /// last successful probe is kept.
    pub fn with_failure(&self, now: DateTime<Utc>, threshold: u32) -> Self {
        let consecutive_failures = self.consecutive_failures.saturating_add(1);
        Self {
            status: AgentStatus::from_failures(consecutive_failures, threshold),
            consecutive_failures,
            last_checked_at: Some(now),
            ..self.clone()
        }
    }

    /// Whether the agent is currently usable.
    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }

    /// Whether the agent advertises the given capability identifier.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// The same descriptor without the raw self-description body.
    pub fn without_raw(mut self) -> Self {
        self.raw_card = None;
        self
    }
}
