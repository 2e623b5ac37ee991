use crate::operation::{Operation, RouteMethod};
use arbiter_core::{ArbiterError, ArbiterResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest body excerpt kept in a [`InvokeError::Remote`] for diagnostics.
const MAX_DIAGNOSTIC_BODY: usize = 2048;

/// Classified outcome of a failed remote operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
    /// Timeout, refused connection, or any failure before a status arrived.
    #[error("transport error: {0}")]
    Transport(String),
    /// The agent answered 404 for the requested resource.
    #[error("not found: {body}")]
    NotFound {
        /// Response body, truncated.
        body: String,
    },
    /// Any other non-2xx answer.
    #[error("remote error {status}: {body}")]
    Remote {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
    /// 2xx, but the body does not match the expected schema.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl InvokeError {
    /// Whether this is an explicit not-found answer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, InvokeError::NotFound { .. })
    }
}

/// Performs one logical operation against an agent.
///
/// The workflow engine depends on this trait rather than on [`A2aClient`]
/// so tests can count and script remote calls.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Invoke `operation` on the agent at `base_url`. No retries.
    async fn invoke(
        &self,
        base_url: &str,
        operation: Operation,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, InvokeError>;
}

/// Decode a successful response into the expected schema.
pub fn decode<T: DeserializeOwned>(
    operation: Operation,
    value: serde_json::Value,
) -> Result<T, InvokeError> {
    serde_json::from_value(value)
        .map_err(|e| InvokeError::Malformed(format!("{operation}: {e}")))
}

/// HTTP implementation of [`Invoker`].
#[derive(Clone)]
pub struct A2aClient {
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl A2aClient {
    /// Create a client whose every call is bounded by `timeout`.
    pub fn new(timeout: Duration) -> ArbiterResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArbiterError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            bearer_token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every call.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[async_trait]
impl Invoker for A2aClient {
    async fn invoke(
        &self,
        base_url: &str,
        operation: Operation,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, InvokeError> {
        let url = operation.url(base_url);
        let mut request = match operation.route().method {
            RouteMethod::Get => self.client.get(&url).query(&query_pairs(&payload)),
            RouteMethod::Post => self.client.post(&url).json(&payload),
        };
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        debug!(operation = %operation, url = %url, "Invoking agent");
        let response = request.send().await.map_err(|e| {
            warn!(operation = %operation, url = %url, error = %e, "Agent unreachable");
            InvokeError::Transport(e.to_string())
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| InvokeError::Transport(e.to_string()))?;

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(InvokeError::NotFound {
                body: excerpt(&body),
            });
        }
        if !status.is_success() {
            warn!(operation = %operation, status = status.as_u16(), "Agent returned error status");
            return Err(InvokeError::Remote {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        serde_json::from_slice(&body)
            .map_err(|e| InvokeError::Malformed(format!("{operation}: body is not JSON: {e}")))
    }
}

/// Flatten a JSON object into query parameters. Non-object payloads carry
/// no parameters.
fn query_pairs(payload: &serde_json::Value) -> Vec<(String, String)> {
    payload
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| {
                    let value = match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= MAX_DIAGNOSTIC_BODY {
        return text.into_owned();
    }
    let mut end = MAX_DIAGNOSTIC_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
