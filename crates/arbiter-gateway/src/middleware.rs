use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::warn;

/// API-key settings for the gateway.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Accepted keys. Empty means no auth required.
    pub api_keys: Vec<String>,
}

impl AuthConfig {
    /// Accept these keys; blank entries are dropped.
    pub fn new(api_keys: Vec<String>) -> Self {
        Self {
            api_keys: api_keys
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Returns true if at least one key is configured.
    pub fn is_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    fn accepts(&self, key: &str) -> bool {
        self.api_keys.iter().any(|k| k == key)
    }
}

/// Query parameters read by [`auth_middleware`].
#[derive(serde::Deserialize, Default)]
pub struct AuthQuery {
    /// Key passed as `?api_key=`.
    pub api_key: Option<String>,
}

/// Validate the API key from `Authorization: Bearer <key>` or `?api_key=<key>`.
///
/// The header wins when both are present. With no keys configured every
/// request passes.
pub async fn auth_middleware(
    State(auth): State<Arc<AuthConfig>>,
    headers: HeaderMap,
    query: Query<AuthQuery>,
    request: Request,
    next: Next,
) -> Response {
    if !auth.is_enabled() {
        return next.run(request).await;
    }

    let key = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
        .or_else(|| query.api_key.clone());

    match key {
        Some(k) if auth.accepts(&k) => next.run(request).await,
        Some(_) => {
            warn!(path = %request.uri().path(), "Rejected request: invalid API key");
            (StatusCode::UNAUTHORIZED, "Invalid API key").into_response()
        }
        None => {
            warn!(path = %request.uri().path(), "Rejected request: missing API key");
            (StatusCode::UNAUTHORIZED, "API key required").into_response()
        }
    }
}
