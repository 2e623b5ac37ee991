use arbiter_core::{AgentDescriptor, AgentDirectory, ArbiterError, ArbiterResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

/// Client for a registry served over HTTP by another process.
#[derive(Clone)]
pub struct RemoteDirectory {
    client: reqwest::Client,
    proxy_url: String,
}

impl RemoteDirectory {
    /// Point at the registry server at `proxy_url`.
    pub fn new(proxy_url: &str, timeout: Duration) -> ArbiterResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArbiterError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            proxy_url: proxy_url.trim().trim_end_matches('/').to_string(),
        })
    }

    /// Query `GET /discover?only_active=...`.
    pub async fn list(&self, only_active: bool) -> ArbiterResult<Vec<AgentDescriptor>> {
        let url = format!("{}/discover", self.proxy_url);
        let response = self
            .client
            .get(&url)
            .query(&[("only_active", only_active)])
            .send()
            .await
            .map_err(|e| {
                ArbiterError::Discovery(format!("registry at {} unreachable: {e}", self.proxy_url))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArbiterError::Discovery(format!(
                "registry at {} returned {status}",
                self.proxy_url
            )));
        }

        let agents: Vec<AgentDescriptor> = response.json().await.map_err(|e| {
            ArbiterError::Discovery(format!("registry response unreadable: {e}"))
        })?;

        for agent in &agents {
            info!(
                id = %agent.id,
                base_url = %agent.base_url,
                status = %agent.status,
                "Discovered agent"
            );
        }
        Ok(agents)
    }
}

#[async_trait]
impl AgentDirectory for RemoteDirectory {
    async fn active_agents(&self) -> ArbiterResult<Vec<AgentDescriptor>> {
        let agents = self.list(true).await?;
        // Older registries ignore the filter; never trust an inactive entry.
        let (active, inactive): (Vec<_>, Vec<_>) =
            agents.into_iter().partition(AgentDescriptor::is_active);
        if !inactive.is_empty() {
            warn!(count = inactive.len(), "Registry returned inactive agents for an active-only query");
        }
        Ok(active)
    }
}
