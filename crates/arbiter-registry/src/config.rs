use arbiter_core::{ArbiterError, ArbiterResult};
use serde::Deserialize;
use std::time::Duration;

/// Conventional location of an agent's self-description document.
pub const DEFAULT_WELL_KNOWN_PATH: &str = "/.well-known/a2a/agent.json";

/// Configuration for the registry and its liveness pollers.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Base URLs of the agents to track. One registry entry per URL.
    #[serde(default)]
    pub agent_urls: Vec<String>,
    /// Seconds between two probes of the same agent (default: 30).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Upper bound for one probe, token acquisition included (default: 10).
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Consecutive failed probes before an agent is marked inactive (default: 3).
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Path of the self-description document under each base URL.
    #[serde(default = "default_well_known_path")]
    pub well_known_path: String,
    /// How probes authenticate against the agents.
    #[serde(default)]
    pub auth: ProbeAuthConfig,
}

/// Authentication applied to liveness probes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ProbeAuthConfig {
    /// Probes are sent without credentials.
    #[default]
    None,
    /// A fixed bearer token.
    Static {
        /// The token sent as `Authorization: Bearer <token>`.
        token: String,
    },
    /// An identity token minted per probe by the cloud metadata server, with
    /// the agent's base URL as audience.
    GcpMetadata {
        /// Override for the metadata server address.
        #[serde(default)]
        endpoint: Option<String>,
    },
}

fn default_poll_interval() -> u64 {
    30
}
fn default_probe_timeout() -> u64 {
    10
}
fn default_failure_threshold() -> u32 {
    3
}
fn default_well_known_path() -> String {
    DEFAULT_WELL_KNOWN_PATH.to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            agent_urls: Vec::new(),
            poll_interval_secs: default_poll_interval(),
            probe_timeout_secs: default_probe_timeout(),
            failure_threshold: default_failure_threshold(),
            well_known_path: default_well_known_path(),
            auth: ProbeAuthConfig::default(),
        }
    }
}

impl RegistryConfig {
    /// Reject settings that would make liveness meaningless.
    pub fn validate(&self) -> ArbiterResult<()> {
        if self.failure_threshold == 0 {
            return Err(ArbiterError::Config(
                "failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(ArbiterError::Config(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.probe_timeout_secs == 0 {
            return Err(ArbiterError::Config(
                "probe_timeout_secs must be at least 1".to_string(),
            ));
        }
        if !self.well_known_path.starts_with('/') {
            return Err(ArbiterError::Config(format!(
                "well_known_path must start with '/', got '{}'",
                self.well_known_path
            )));
        }
        Ok(())
    }

    /// Interval between probes.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Per-probe timeout.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Parse a comma-separated URL list such as the `AGENT_URLS` variable.
    pub fn parse_url_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect()
    }
}
