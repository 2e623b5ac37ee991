use crate::config::ProbeAuthConfig;
use arbiter_core::{ArbiterError, ArbiterResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const GCP_METADATA_ENDPOINT: &str = "http://metadata.google.internal";
const GCP_IDENTITY_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/identity";

/// Source of bearer tokens for liveness probes.
///
/// A provider is asked for a fresh token before every probe. `Ok(None)` means
/// "send the probe unauthenticated"; an error fails the probe.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Produce a token valid for calls to `audience` (the agent base URL).
    async fn token(&self, audience: &str) -> ArbiterResult<Option<String>>;
}

/// Probes go out without credentials.
pub struct NoAuth;

#[async_trait]
impl TokenProvider for NoAuth {
    async fn token(&self, _audience: &str) -> ArbiterResult<Option<String>> {
        Ok(None)
    }
}

/// A fixed token, e.g. a shared secret in front of an internal gateway.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    /// Wrap a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self, _audience: &str) -> ArbiterResult<Option<String>> {
        Ok(Some(self.token.clone()))
    }
}

/// Identity tokens minted by the cloud metadata server for each audience.
pub struct MetadataServerToken {
    client: reqwest::Client,
    endpoint: String,
}

impl MetadataServerToken {
    /// Use the given metadata server address, or the well-known default.
    pub fn new(endpoint: Option<String>, timeout: Duration) -> ArbiterResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArbiterError::Http(format!("Failed to create HTTP client: {e}")))?;
        let endpoint = endpoint
            .unwrap_or_else(|| GCP_METADATA_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl TokenProvider for MetadataServerToken {
    async fn token(&self, audience: &str) -> ArbiterResult<Option<String>> {
        let url = format!("{}{GCP_IDENTITY_PATH}", self.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[("audience", audience)])
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| ArbiterError::Http(format!("identity token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArbiterError::Http(format!(
                "metadata server returned {status} for audience {audience}"
            )));
        }

        let token = response
            .text()
            .await
            .map_err(|e| ArbiterError::Http(format!("identity token body unreadable: {e}")))?;
        let token = token.trim();
        if token.is_empty() {
            return Err(ArbiterError::Http(format!(
                "metadata server returned an empty token for audience {audience}"
            )));
        }

        debug!(audience = %audience, "Fetched identity token");
        Ok(Some(token.to_string()))
    }
}

/// Build the provider described by the registry configuration.
pub fn provider_from_config(
    auth: &ProbeAuthConfig,
    timeout: Duration,
) -> ArbiterResult<Arc<dyn TokenProvider>> {
    Ok(match auth {
        ProbeAuthConfig::None => Arc::new(NoAuth),
        ProbeAuthConfig::Static { token } => Arc::new(StaticToken::new(token.clone())),
        ProbeAuthConfig::GcpMetadata { endpoint } => {
            Arc::new(MetadataServerToken::new(endpoint.clone(), timeout)?)
        }
    })
}
