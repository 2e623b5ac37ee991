use crate::middleware::{auth_middleware, AuthConfig};
use arbiter_core::AgentDescriptor;
use arbiter_orchestrator::{DisputeRequest, WorkflowEngine, WorkflowInstance};
use arbiter_registry::DiscoveryService;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware as axum_mw,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;

/// Shared application state.
pub struct AppState {
    /// Read view over the registry.
    pub discovery: DiscoveryService,
    /// Workflow engine; `/disputes` answers 503 without one.
    pub engine: Option<Arc<WorkflowEngine>>,
}

/// The HTTP gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the gateway without auth.
    pub fn build(discovery: DiscoveryService, engine: Option<Arc<WorkflowEngine>>) -> Router {
        Self::build_with_auth(discovery, engine, AuthConfig::default())
    }

    /// Build the gateway. `/healthz` stays open; every other route requires
    /// an API key when `auth` has any.
    pub fn build_with_auth(
        discovery: DiscoveryService,
        engine: Option<Arc<WorkflowEngine>>,
        auth: AuthConfig,
    ) -> Router {
        let state = Arc::new(AppState { discovery, engine });

        let protected = Router::new()
            .route("/discover", get(discover_handler))
            .route("/discover/raw", get(discover_raw_handler))
            .route("/disputes", post(dispute_handler))
            .route_layer(
                ServiceBuilder::new()
                    .layer(axum_mw::from_fn_with_state(Arc::new(auth), auth_middleware)),
            );

        Router::new()
            .route("/healthz", get(health_handler))
            .merge(protected)
            .with_state(state)
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let mut body = serde_json::json!({
        "status": "ok",
        "service": "arbiter",
        "agents": state.discovery.catalog_size(),
        "active_agents": state.discovery.list(true).len(),
    });
    if let Some(engine) = &state.engine {
        body["workflows"] = serde_json::json!(engine.monitor().snapshot());
    }
    Json(body)
}

#[derive(Deserialize)]
struct DiscoverQuery {
    #[serde(default = "default_only_active")]
    only_active: bool,
}

fn default_only_active() -> bool {
    true
}

/// Registry contents without the raw self-description bodies.
async fn discover_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DiscoverQuery>,
) -> Json<Vec<AgentDescriptor>> {
    let agents: Vec<AgentDescriptor> = state
        .discovery
        .list(query.only_active)
        .into_iter()
        .map(AgentDescriptor::without_raw)
        .collect();
    info!(
        only_active = query.only_active,
        count = agents.len(),
        "Discovery query served"
    );
    Json(agents)
}

/// Every slot, including the last raw self-description seen.
async fn discover_raw_handler(State(state): State<Arc<AppState>>) -> Json<Vec<AgentDescriptor>> {
    Json(state.discovery.list(false))
}

async fn dispute_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DisputeRequest>,
) -> Response {
    let Some(engine) = &state.engine else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "dispute workflows are not enabled on this gateway",
        );
    };
    if request.transaction_id.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "transaction_id must not be empty");
    }

    let instance: WorkflowInstance = engine.run(request).await;
    Json(instance).into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
