#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end dispute workflows.
//!
//! Two simulated agents (transaction detail and dispute policy) are probed by
//! real liveness pollers, discovered through the registry, and invoked through
//! the HTTP client. Each scenario checks the terminal outcome plus which remote
//! calls were and were not made.

use arbiter_a2a::{A2aClient, InvokeError, Invoker, Operation};
use arbiter_core::PolicyDecision;
use arbiter_orchestrator::*;
use arbiter_registry::poller::probe_client;
use arbiter_registry::{DiscoveryService, LivenessPoller, NoAuth, RegistryConfig, RegistryStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WELL_KNOWN: &str = "/.well-known/a2a/agent.json";

// ---------------------------------------------------------------------------
// Simulated agents
// ---------------------------------------------------------------------------

struct Agents {
    tx: MockServer,
    policy: MockServer,
}

fn record(id: &str, amount: f64, merchant: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "transaction_id": id,
        "amount": amount,
        "currency": "USD",
        "merchant": merchant,
        "timestamp": "2023-10-25T15:00:00",
        "status": status
    })
}

async fn card(server: &MockServer, id: &str, capabilities: &[&str]) {
    Mock::given(method("GET"))
        .and(path(WELL_KNOWN))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": id,
            "display_name": id,
            "description": "simulated",
            "capabilities": capabilities,
        })))
        .mount(server)
        .await;
}

async fn transaction(server: &MockServer, record_json: serde_json::Value) {
    let id = record_json["transaction_id"].as_str().unwrap().to_string();
    Mock::given(method("GET"))
        .and(path("/get_transaction_details"))
        .and(query_param("transaction_id", id.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(record_json))
        .mount(server)
        .await;
}

async fn transaction_missing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/get_transaction_details"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({"detail": "Transaction not found"})),
        )
        .mount(server)
        .await;
}

async fn decision(server: &MockServer, transaction_id: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/check_dispute_policy"))
        .and(body_partial_json(
            serde_json::json!({"transaction": {"transaction_id": transaction_id}}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Both agents healthy, with the records used across scenarios.
async fn standard_agents(fallback: bool) -> Agents {
    let tx = MockServer::start().await;
    let policy = MockServer::start().await;

    let mut capabilities = vec!["get_transaction_details"];
    if fallback {
        capabilities.push("query_bigquery");
    }
    card(&tx, "Transaction_Detail_Agent", &capabilities).await;
    card(&policy, "Dispute_Policy_Agent", &["check_dispute_policy"]).await;

    transaction(&tx, record("TX12345", 25.0, "Bookstore", "completed")).await;
    transaction(&tx, record("TX99999", 5000.0, "Electronics Hub", "completed")).await;
    transaction_missing(&tx).await;

    Mock::given(method("POST"))
        .and(path("/query_bigquery"))
        .and(body_partial_json(serde_json::json!({
            "sql_query": "SELECT * FROM transactions WHERE transaction_id = 'TX11223' LIMIT 1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "row_count": 1,
            "results": [record("TX11223", 75.0, "Coffee Shop", "completed")]
        })))
        .mount(&tx)
        .await;
    Mock::given(method("POST"))
        .and(path("/query_bigquery"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"row_count": 0, "results": []})),
        )
        .mount(&tx)
        .await;

    for id in ["TX12345", "TX11223"] {
        decision(
            &policy,
            id,
            serde_json::json!({
                "dispute_id": format!("DISPUTE-{id}"),
                "transaction_id": id,
                "policy_decision": "Approved",
                "reasoning": "Amount is below the auto-approval limit.",
                "next_steps": "Refund will be issued within 3 business days."
            }),
        )
        .await;
    }
    decision(
        &policy,
        "TX99999",
        serde_json::json!({
            "dispute_id": "DISPUTE-TX99999",
            "transaction_id": "TX99999",
            "policy_decision": "NeedsReview",
            "reasoning": "High value transaction requires manual review.",
            "next_steps": ["Escalate to the disputes team", "Contact the merchant"]
        }),
    )
    .await;

    Agents { tx, policy }
}

// ---------------------------------------------------------------------------
// Registry and engine wiring
// ---------------------------------------------------------------------------

/// Probe every agent once so the registry reflects their current health.
async fn discover(urls: Vec<String>) -> DiscoveryService {
    let config = RegistryConfig {
        agent_urls: urls,
        probe_timeout_secs: 1,
        failure_threshold: 1,
        ..RegistryConfig::default()
    };
    let store = Arc::new(RegistryStore::from_urls(
        &config.agent_urls,
        config.failure_threshold,
    ));
    let client = probe_client(config.probe_timeout()).unwrap();
    for url in &config.agent_urls {
        let poller = LivenessPoller::new(store.clone(), url, &config, client.clone(), Arc::new(NoAuth));
        let _ = poller.poll_once().await;
    }
    DiscoveryService::new(store)
}

/// Counts every remote operation on its way to the real client.
struct Counting {
    inner: A2aClient,
    calls: AtomicU32,
}

#[async_trait]
impl Invoker for Counting {
    async fn invoke(
        &self,
        base_url: &str,
        operation: Operation,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.invoke(base_url, operation, payload).await
    }
}

async fn engine_for(agents: &Agents, config: EngineConfig) -> (WorkflowEngine, Arc<Counting>) {
    let directory = discover(vec![agents.tx.uri(), agents.policy.uri()]).await;
    let invoker = Arc::new(Counting {
        inner: A2aClient::new(config.call_timeout()).unwrap(),
        calls: AtomicU32::new(0),
    });
    let engine = WorkflowEngine::new(Arc::new(directory), invoker.clone(), config).unwrap();
    (engine, invoker)
}

async fn operation_requests(server: &MockServer, op_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == op_path)
        .count()
}

fn reason(instance: &WorkflowInstance) -> Option<FailureReason> {
    instance.outcome.as_ref().and_then(WorkflowResult::failure_reason)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_scenario_a_small_transaction_is_approved() {
    let agents = standard_agents(true).await;
    let (engine, _) = engine_for(&agents, EngineConfig::default()).await;

    let instance = engine
        .run(DisputeRequest::new("TX12345", "Product not received"))
        .await;

    assert_eq!(instance.state, WorkflowState::Complete);
    match instance.outcome.as_ref().unwrap() {
        WorkflowResult::Success {
            decision,
            next_steps,
            ..
        } => {
            assert_eq!(*decision, PolicyDecision::Approved);
            assert_eq!(next_steps.len(), 1);
        }
        other => panic!("expected success, got {other:?}"),
    }
    assert_eq!(instance.transaction_details.as_ref().unwrap().amount, 25.0);
    assert_eq!(
        instance.policy_result.as_ref().unwrap().dispute_id.as_deref(),
        Some("DISPUTE-TX12345")
    );
}

#[tokio::test]
async fn test_scenario_b_high_value_is_not_approved() {
    let agents = standard_agents(true).await;
    let (engine, _) = engine_for(&agents, EngineConfig::default()).await;

    let instance = engine
        .run(DisputeRequest::new("TX99999", "Unauthorized charge"))
        .await;

    assert_eq!(instance.state, WorkflowState::Complete);
    match instance.outcome.as_ref().unwrap() {
        WorkflowResult::Success {
            decision,
            next_steps,
            ..
        } => {
            assert_ne!(*decision, PolicyDecision::Approved);
            assert_eq!(next_steps.len(), 2);
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn test_scenario_c_absent_everywhere_is_not_found() {
    let agents = standard_agents(true).await;
    let (engine, invoker) = engine_for(&agents, EngineConfig::default()).await;

    let instance = engine
        .run(DisputeRequest::new("NOTFOUND", "Duplicate charge"))
        .await;

    assert_eq!(instance.state, WorkflowState::Failed);
    assert_eq!(reason(&instance), Some(FailureReason::TransactionNotFound));
    assert!(instance.visited(WorkflowState::FallbackQuery));
    assert!(!instance.visited(WorkflowState::EvaluatingPolicy));
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 2);
    assert_eq!(operation_requests(&agents.policy, "/check_dispute_policy").await, 0);
}

#[tokio::test]
async fn test_scenario_d_unreachable_policy_agent_keeps_details() {
    let tx = MockServer::start().await;
    let policy = MockServer::start().await;
    card(&tx, "Transaction_Detail_Agent", &["get_transaction_details"]).await;
    card(&policy, "Dispute_Policy_Agent", &["check_dispute_policy"]).await;
    transaction(&tx, record("TX12345", 25.0, "Bookstore", "completed")).await;
    // Healthy enough to be discovered, but every call hangs past the client timeout.
    Mock::given(method("POST"))
        .and(path("/check_dispute_policy"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&policy)
        .await;
    let agents = Agents { tx, policy };
    let config = EngineConfig {
        call_timeout_secs: 1,
        ..EngineConfig::default()
    };
    let (engine, _) = engine_for(&agents, config).await;

    let instance = engine
        .run(DisputeRequest::new("TX12345", "Product not received"))
        .await;

    assert_eq!(reason(&instance), Some(FailureReason::PolicyEvaluationError));
    let details = instance.transaction_details.as_ref().unwrap();
    assert_eq!(details.transaction_id, "TX12345");
    assert_eq!(details.merchant, "Bookstore");
    assert!(instance.policy_result.is_none());
    match instance.outcome.as_ref().unwrap() {
        WorkflowResult::Failure { message, .. } => assert!(message.contains("transport")),
        other => panic!("expected failure, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_direct_hit_never_runs_fallback() {
    let agents = standard_agents(true).await;
    let (engine, invoker) = engine_for(&agents, EngineConfig::default()).await;

    let instance = engine.run(DisputeRequest::new("TX12345", "x")).await;

    assert!(instance.outcome.as_ref().unwrap().is_success());
    assert!(!instance.visited(WorkflowState::FallbackQuery));
    assert_eq!(
        instance.history,
        vec![
            WorkflowState::Init,
            WorkflowState::Discovering,
            WorkflowState::FetchingDetails,
            WorkflowState::EvaluatingPolicy,
            WorkflowState::Complete,
        ]
    );
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 2);
    assert_eq!(operation_requests(&agents.tx, "/query_bigquery").await, 0);
}

#[tokio::test]
async fn test_fallback_hit_has_same_result_shape_as_direct_hit() {
    let agents = standard_agents(true).await;
    let (engine, _) = engine_for(&agents, EngineConfig::default()).await;

    let direct = engine.run(DisputeRequest::new("TX12345", "x")).await;
    let via_fallback = engine.run(DisputeRequest::new("TX11223", "x")).await;

    assert!(via_fallback.visited(WorkflowState::FallbackQuery));
    assert_eq!(via_fallback.state, WorkflowState::Complete);
    assert_eq!(via_fallback.remote_calls, 3);
    assert_eq!(
        via_fallback.transaction_details.as_ref().unwrap().merchant,
        "Coffee Shop"
    );

    let keys = |instance: &WorkflowInstance| {
        let json = serde_json::to_value(instance.outcome.as_ref().unwrap()).unwrap();
        let mut keys: Vec<String> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    };
    assert_eq!(keys(&direct), keys(&via_fallback));
    assert_eq!(direct.outcome, via_fallback.outcome);
}

#[tokio::test]
async fn test_inactive_policy_agent_fails_before_any_call() {
    let tx = MockServer::start().await;
    let policy = MockServer::start().await;
    card(&tx, "Transaction_Detail_Agent", &["get_transaction_details"]).await;
    Mock::given(method("GET"))
        .and(path(WELL_KNOWN))
        .respond_with(ResponseTemplate::new(503))
        .mount(&policy)
        .await;
    let agents = Agents { tx, policy };
    let (engine, invoker) = engine_for(&agents, EngineConfig::default()).await;

    let instance = engine.run(DisputeRequest::new("TX12345", "x")).await;

    assert_eq!(reason(&instance), Some(FailureReason::AgentsUnavailable));
    assert_eq!(
        instance.history,
        vec![WorkflowState::Init, WorkflowState::Discovering, WorkflowState::Failed]
    );
    assert_eq!(instance.remote_calls, 0);
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
    assert_eq!(operation_requests(&agents.tx, "/get_transaction_details").await, 0);
}

#[tokio::test]
async fn test_not_found_without_fallback_capability() {
    let agents = standard_agents(false).await;
    let (engine, invoker) = engine_for(&agents, EngineConfig::default()).await;

    let instance = engine.run(DisputeRequest::new("TX11223", "x")).await;

    assert_eq!(reason(&instance), Some(FailureReason::TransactionNotFound));
    assert!(!instance.visited(WorkflowState::FallbackQuery));
    assert_eq!(invoker.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_workflow_deadline_reports_timeout() {
    let tx = MockServer::start().await;
    let policy = MockServer::start().await;
    card(&tx, "Transaction_Detail_Agent", &["get_transaction_details"]).await;
    card(&policy, "Dispute_Policy_Agent", &["check_dispute_policy"]).await;
    Mock::given(method("GET"))
        .and(path("/get_transaction_details"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(record("TX12345", 25.0, "Bookstore", "completed"))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&tx)
        .await;
    let agents = Agents { tx, policy };
    let config = EngineConfig {
        call_timeout_secs: 30,
        workflow_deadline_secs: 1,
        ..EngineConfig::default()
    };
    let (engine, _) = engine_for(&agents, config).await;

    let started = std::time::Instant::now();
    let instance = engine.run(DisputeRequest::new("TX12345", "x")).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(instance.state, WorkflowState::Failed);
    assert_eq!(reason(&instance), Some(FailureReason::Timeout));
    assert!(instance.visited(WorkflowState::FetchingDetails));
    assert_eq!(instance.remote_calls, 1);
}

#[tokio::test]
async fn test_concurrent_workflows_are_independent() {
    let agents = standard_agents(true).await;
    let config = EngineConfig {
        max_concurrent_workflows: Some(2),
        ..EngineConfig::default()
    };
    let (engine, _) = engine_for(&agents, config).await;
    let engine = Arc::new(engine);

    let ids = ["TX12345", "TX99999", "NOTFOUND", "TX11223"];
    let handles: Vec<_> = ids
        .iter()
        .map(|id| {
            let engine = engine.clone();
            let request = DisputeRequest::new(*id, "Duplicate charge");
            tokio::spawn(async move { engine.run(request).await })
        })
        .collect();

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    for (id, instance) in ids.iter().zip(&results) {
        assert_eq!(instance.request.transaction_id, *id);
        assert!(instance.is_terminal());
    }
    assert_eq!(reason(&results[2]), Some(FailureReason::TransactionNotFound));
    let stats = engine.monitor().snapshot();
    assert_eq!(stats.started, 4);
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.in_flight, 0);
}
