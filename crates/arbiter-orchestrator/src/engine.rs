use crate::bindings::AgentBindings;
use crate::config::EngineConfig;
use crate::monitor::WorkflowMonitor;
use crate::types::{DisputeRequest, FailureReason, WorkflowInstance, WorkflowResult, WorkflowState};
use arbiter_a2a::{decode, InvokeError, Invoker, Operation};
use arbiter_core::{
    AgentDirectory, ArbiterResult, PolicyCheckRequest, PolicyCheckResponse, QueryRequest,
    QueryResponse, TransactionDetails,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// A step that ended the workflow.
struct StepFailure {
    reason: FailureReason,
    message: String,
}

impl StepFailure {
    fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

type StepResult<T> = Result<T, StepFailure>;

/// Fallback query for one transaction. Single quotes in the id are doubled.
pub fn fallback_query(transaction_id: &str) -> String {
    format!(
        "SELECT * FROM transactions WHERE transaction_id = '{}' LIMIT 1",
        transaction_id.replace('\'', "''")
    )
}

/// Drives dispute workflows against discovered agents.
///
/// Every call to [`run`](Self::run) owns a fresh [`WorkflowInstance`];
/// concurrent runs share nothing but the directory and the invoker.
pub struct WorkflowEngine {
    directory: Arc<dyn AgentDirectory>,
    invoker: Arc<dyn Invoker>,
    config: EngineConfig,
    permits: Option<Arc<Semaphore>>,
    monitor: Arc<WorkflowMonitor>,
}

impl WorkflowEngine {
    /// Create an engine. Fails if `config` does not validate.
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        invoker: Arc<dyn Invoker>,
        config: EngineConfig,
    ) -> ArbiterResult<Self> {
        config.validate()?;
        let permits = config
            .max_concurrent_workflows
            .map(|n| Arc::new(Semaphore::new(n)));
        Ok(Self {
            directory,
            invoker,
            config,
            permits,
            monitor: Arc::new(WorkflowMonitor::new()),
        })
    }

    /// Settings this engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Outcome counters for every run of this engine.
    pub fn monitor(&self) -> &Arc<WorkflowMonitor> {
        &self.monitor
    }

    /// Run one dispute to a terminal state.
    ///
    /// Never fails: every error ends up as a `FAILED` instance with its
    /// reason code. The deadline covers the workflow itself, not the wait
    /// for a concurrency permit. When it passes, the in-flight call is
    /// dropped and the instance is returned as `FAILED/TIMEOUT` with
    /// whatever it had gathered so far.
    pub async fn run(&self, request: DisputeRequest) -> WorkflowInstance {
        let _permit = match &self.permits {
            Some(permits) => Arc::clone(permits).acquire_owned().await.ok(),
            None => None,
        };

        let mut instance = WorkflowInstance::new(request);
        let run = self.monitor.start();
        info!(
            workflow = %instance.id,
            transaction_id = %instance.request.transaction_id,
            "Starting dispute workflow"
        );

        let deadline = self.config.workflow_deadline();
        if tokio::time::timeout(deadline, self.drive(&mut instance))
            .await
            .is_err()
        {
            warn!(
                workflow = %instance.id,
                state = %instance.state,
                deadline_secs = deadline.as_secs(),
                "Dispute workflow exceeded its deadline"
            );
            let message = format!(
                "workflow exceeded its {}s deadline while {}",
                deadline.as_secs(),
                instance.state
            );
            instance.fail(FailureReason::Timeout, message);
        }

        run.finish(&instance);
        match &instance.outcome {
            Some(WorkflowResult::Success { decision, .. }) => info!(
                workflow = %instance.id,
                decision = %decision,
                remote_calls = instance.remote_calls,
                "Dispute workflow complete"
            ),
            Some(WorkflowResult::Failure { reason, message }) => warn!(
                workflow = %instance.id,
                reason = %reason,
                message = %message,
                remote_calls = instance.remote_calls,
                "Dispute workflow failed"
            ),
            None => error!(workflow = %instance.id, "Dispute workflow ended without an outcome"),
        }
        instance
    }

    async fn drive(&self, instance: &mut WorkflowInstance) {
        if let Err(failure) = self.steps(instance).await {
            instance.fail(failure.reason, failure.message);
        }
    }

    async fn steps(&self, instance: &mut WorkflowInstance) -> StepResult<()> {
        instance.transition(WorkflowState::Discovering);
        let bindings = self.discover().await?;

        instance.transition(WorkflowState::FetchingDetails);
        let details = self.fetch_details(instance, &bindings).await?;
        instance.transaction_details = Some(details.clone());

        instance.transition(WorkflowState::EvaluatingPolicy);
        let policy = self.evaluate_policy(instance, &bindings, details).await?;
        instance.complete(policy);
        Ok(())
    }

    async fn discover(&self) -> StepResult<AgentBindings> {
        let agents = self.directory.active_agents().await.map_err(|e| {
            StepFailure::new(
                FailureReason::AgentsUnavailable,
                format!("agent discovery failed: {e}"),
            )
        })?;
        AgentBindings::resolve(&agents, &self.config)
            .map_err(|message| StepFailure::new(FailureReason::AgentsUnavailable, message))
    }

    async fn fetch_details(
        &self,
        instance: &mut WorkflowInstance,
        bindings: &AgentBindings,
    ) -> StepResult<TransactionDetails> {
        let transaction_id = instance.request.transaction_id.clone();
        let payload = serde_json::json!({ "transaction_id": transaction_id });
        let outcome = self
            .call(instance, &bindings.transaction.base_url, Operation::GetTransactionDetails, payload)
            .await
            .and_then(|value| decode::<TransactionDetails>(Operation::GetTransactionDetails, value));

        match outcome {
            Ok(details) => {
                info!(
                    transaction_id = %details.transaction_id,
                    amount = details.amount,
                    currency = %details.currency,
                    merchant = %details.merchant,
                    "Transaction details found"
                );
                Ok(details)
            }
            Err(InvokeError::NotFound { .. }) if bindings.fallback_supported => {
                warn!(
                    transaction_id = %transaction_id,
                    "Transaction not found by direct lookup, trying fallback query"
                );
                instance.transition(WorkflowState::FallbackQuery);
                self.fallback(instance, bindings).await
            }
            Err(InvokeError::NotFound { .. }) => Err(StepFailure::new(
                FailureReason::TransactionNotFound,
                format!("Transaction {transaction_id} not found"),
            )),
            Err(e) => Err(StepFailure::new(
                FailureReason::DetailLookupError,
                format!("transaction lookup for {transaction_id} failed: {e}"),
            )),
        }
    }

    async fn fallback(
        &self,
        instance: &mut WorkflowInstance,
        bindings: &AgentBindings,
    ) -> StepResult<TransactionDetails> {
        let transaction_id = instance.request.transaction_id.clone();
        let not_found = |detail: String| {
            StepFailure::new(
                FailureReason::TransactionNotFound,
                format!("Transaction {transaction_id} not found: {detail}"),
            )
        };

        let request = QueryRequest {
            sql_query: fallback_query(&transaction_id),
        };
        let payload = serde_json::to_value(&request).map_err(|e| not_found(e.to_string()))?;
        let response = self
            .call(instance, &bindings.transaction.base_url, Operation::QueryTransactions, payload)
            .await
            .and_then(|value| decode::<QueryResponse>(Operation::QueryTransactions, value))
            .map_err(|e| not_found(format!("fallback query failed: {e}")))?;

        let record = response
            .results
            .into_iter()
            .filter(|row| row.get("transaction_id").and_then(|v| v.as_str()) == Some(transaction_id.as_str()))
            .find_map(|row| serde_json::from_value::<TransactionDetails>(row).ok());

        match record {
            Some(details) => {
                info!(transaction_id = %details.transaction_id, "Transaction found by fallback query");
                Ok(details)
            }
            None => Err(not_found("fallback query matched no records".to_string())),
        }
    }

    async fn evaluate_policy(
        &self,
        instance: &mut WorkflowInstance,
        bindings: &AgentBindings,
        transaction: TransactionDetails,
    ) -> StepResult<PolicyCheckResponse> {
        let request = PolicyCheckRequest {
            transaction,
            reason: instance.request.reason.clone(),
            customer_notes: instance.request.customer_notes.clone(),
        };
        let failure = |detail: String| {
            StepFailure::new(
                FailureReason::PolicyEvaluationError,
                format!("policy evaluation failed: {detail}"),
            )
        };

        let payload = serde_json::to_value(&request).map_err(|e| failure(e.to_string()))?;
        let response = self
            .call(instance, &bindings.policy.base_url, Operation::CheckDisputePolicy, payload)
            .await
            .and_then(|value| decode::<PolicyCheckResponse>(Operation::CheckDisputePolicy, value))
            .map_err(|e| failure(e.to_string()))?;

        info!(
            decision = %response.policy_decision,
            reasoning = %response.reasoning,
            "Policy decision received"
        );
        Ok(response)
    }

    /// One remote call, counted on the instance and bounded by the call timeout.
    async fn call(
        &self,
        instance: &mut WorkflowInstance,
        base_url: &str,
        operation: Operation,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, InvokeError> {
        instance.remote_calls += 1;
        let timeout = self.config.call_timeout();
        match tokio::time::timeout(timeout, self.invoker.invoke(base_url, operation, payload)).await
        {
            Ok(result) => result,
            Err(_) => Err(InvokeError::Transport(format!(
                "{operation} timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }
}
