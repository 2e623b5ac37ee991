#![allow(clippy::unwrap_used, clippy::expect_used)]

//! A2A client and remote directory against simulated agents.

use arbiter_a2a::{decode, A2aClient, InvokeError, Invoker, Operation, RemoteDirectory};
use arbiter_core::{AgentDirectory, PolicyCheckResponse, PolicyDecision, TransactionDetails};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> A2aClient {
    A2aClient::new(Duration::from_secs(1)).unwrap()
}

#[tokio::test]
async fn test_get_sends_payload_as_query() {
    let agent = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get_transaction_details"))
        .and(query_param("transaction_id", "TX12345"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "transaction_id": "TX12345",
            "amount": 25.0,
            "currency": "USD",
            "merchant": "Bookstore",
            "timestamp": "2023-10-25T15:00:00",
            "status": "completed"
        })))
        .expect(1)
        .mount(&agent)
        .await;

    let value = client()
        .invoke(
            &agent.uri(),
            Operation::GetTransactionDetails,
            serde_json::json!({"transaction_id": "TX12345"}),
        )
        .await
        .unwrap();
    let tx: TransactionDetails = decode(Operation::GetTransactionDetails, value).unwrap();
    assert_eq!(tx.merchant, "Bookstore");
}

#[tokio::test]
async fn test_post_sends_payload_as_body() {
    let agent = MockServer::start().await;
    let payload = serde_json::json!({"transaction": {"transaction_id": "TX1"}, "reason": "Duplicate charge"});
    Mock::given(method("POST"))
        .and(path("/check_dispute_policy"))
        .and(body_json(payload.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "dispute_id": "DISPUTE-0000",
            "transaction_id": "TX1",
            "policy_decision": "Rejected",
            "reasoning": "Pending transaction",
            "next_steps": "Wait"
        })))
        .mount(&agent)
        .await;

    let value = client()
        .invoke(&agent.uri(), Operation::CheckDisputePolicy, payload)
        .await
        .unwrap();
    let resp: PolicyCheckResponse = decode(Operation::CheckDisputePolicy, value).unwrap();
    assert_eq!(resp.policy_decision, PolicyDecision::Rejected);
}

#[tokio::test]
async fn test_404_is_not_found() {
    let agent = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/get_transaction_details"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({"detail": "Transaction 'NOTFOUND' not found"})),
        )
        .mount(&agent)
        .await;

    let err = client()
        .invoke(
            &agent.uri(),
            Operation::GetTransactionDetails,
            serde_json::json!({"transaction_id": "NOTFOUND"}),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("NOTFOUND"));
}

#[tokio::test]
async fn test_5xx_is_remote_error_with_body() {
    let agent = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
        .mount(&agent)
        .await;

    let err = client()
        .invoke(&agent.uri(), Operation::QueryTransactions, serde_json::json!({"sql_query": "x"}))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        InvokeError::Remote {
            status: 503,
            body: "upstream overloaded".to_string()
        }
    );
}

#[tokio::test]
async fn test_non_json_success_is_malformed() {
    let agent = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&agent)
        .await;

    let err = client()
        .invoke(&agent.uri(), Operation::CheckDisputePolicy, serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, InvokeError::Malformed(_)));
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let agent = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&agent)
        .await;

    let started = std::time::Instant::now();
    let err = client()
        .invoke(&agent.uri(), Operation::CheckDisputePolicy, serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, InvokeError::Transport(_)));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let err = client()
        .invoke("http://127.0.0.1:1", Operation::CheckDisputePolicy, serde_json::json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, InvokeError::Transport(_)));
}

#[tokio::test]
async fn test_bearer_token_is_forwarded() {
    let agent = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("Authorization", "Bearer call-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": []})))
        .expect(1)
        .mount(&agent)
        .await;

    client()
        .with_bearer_token("call-token")
        .invoke(&agent.uri(), Operation::QueryTransactions, serde_json::json!({"sql_query": "x"}))
        .await
        .unwrap();
}

fn descriptor_json(id: &str, status: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "base_url": format!("http://{}.internal", id.to_lowercase()),
        "name": id,
        "capabilities": ["get_transaction_details"],
        "status": status,
        "consecutive_failures": 0,
        "last_checked_at": "2024-05-01T12:00:00Z",
        "last_success_at": "2024-05-01T12:00:00Z"
    })
}

#[tokio::test]
async fn test_remote_directory_lists_active_agents() {
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/discover"))
        .and(query_param("only_active", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            descriptor_json("Transaction_Detail_Agent", "active"),
            descriptor_json("Stale_Agent", "inactive"),
        ])))
        .mount(&proxy)
        .await;

    let directory = RemoteDirectory::new(&proxy.uri(), Duration::from_secs(1)).unwrap();
    let agents = directory.active_agents().await.unwrap();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].id, "Transaction_Detail_Agent");
    assert_eq!(agents[0].display_name.as_deref(), Some("Transaction_Detail_Agent"));
}

#[tokio::test]
async fn test_remote_directory_error_status() {
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&proxy)
        .await;

    let directory = RemoteDirectory::new(&proxy.uri(), Duration::from_secs(1)).unwrap();
    let err = directory.list(false).await.unwrap_err();
    assert!(err.to_string().starts_with("Discovery error"));
}
