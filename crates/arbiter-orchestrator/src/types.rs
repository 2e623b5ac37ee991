use arbiter_core::{PolicyCheckResponse, PolicyDecision, TransactionDetails};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Position of a workflow instance in the dispute state machine.
///
/// The machine is linear with one conditional branch:
/// `INIT → DISCOVERING → FETCHING_DETAILS → [FALLBACK_QUERY] →
/// EVALUATING_POLICY → COMPLETE`, and any non-terminal state may end in
/// `FAILED`. No state is revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    /// Created, not started.
    Init,
    /// Reading the active-agent snapshot.
    Discovering,
    /// Primary lookup of the disputed transaction.
    FetchingDetails,
    /// Structured-query lookup after an explicit not-found.
    FallbackQuery,
    /// Asking the policy agent for a decision.
    EvaluatingPolicy,
    /// Terminal success.
    Complete,
    /// Terminal failure.
    Failed,
}

impl WorkflowState {
    /// `COMPLETE` and `FAILED` end a workflow.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Complete | WorkflowState::Failed)
    }

    /// Whether the machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Failed) => true,
            (Init, Discovering)
            | (Discovering, FetchingDetails)
            | (FetchingDetails, FallbackQuery)
            | (FetchingDetails, EvaluatingPolicy)
            | (FallbackQuery, EvaluatingPolicy)
            | (EvaluatingPolicy, Complete) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowState::Init => "INIT",
            WorkflowState::Discovering => "DISCOVERING",
            WorkflowState::FetchingDetails => "FETCHING_DETAILS",
            WorkflowState::FallbackQuery => "FALLBACK_QUERY",
            WorkflowState::EvaluatingPolicy => "EVALUATING_POLICY",
            WorkflowState::Complete => "COMPLETE",
            WorkflowState::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// Reason code carried by a failed workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// Discovery could not resolve both required agents.
    AgentsUnavailable,
    /// Neither the primary nor the fallback lookup produced a record.
    TransactionNotFound,
    /// Transport or malformed-response failure of the primary lookup.
    DetailLookupError,
    /// Any failure of the policy evaluation call.
    PolicyEvaluationError,
    /// The overall workflow deadline passed.
    Timeout,
}

impl FailureReason {
    /// Wire code, e.g. `TRANSACTION_NOT_FOUND`.
    pub fn code(self) -> &'static str {
        match self {
            FailureReason::AgentsUnavailable => "AGENTS_UNAVAILABLE",
            FailureReason::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            FailureReason::DetailLookupError => "DETAIL_LOOKUP_ERROR",
            FailureReason::PolicyEvaluationError => "POLICY_EVALUATION_ERROR",
            FailureReason::Timeout => "TIMEOUT",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// What the caller asks the engine to adjudicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeRequest {
    /// Disputed transaction.
    pub transaction_id: String,
    /// Free-text dispute reason.
    pub reason: String,
    /// Optional extra notes forwarded to the policy agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_notes: Option<String>,
}

impl DisputeRequest {
    /// A dispute without customer notes.
    pub fn new(transaction_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            reason: reason.into(),
            customer_notes: None,
        }
    }

    /// Attach free-text notes for the policy agent.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.customer_notes = Some(notes.into());
        self
    }
}

/// Terminal outcome returned to whoever started the workflow.
///
/// Both lookup paths produce the same `Success` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WorkflowResult {
    /// The policy agent decided.
    Success {
        /// The decision.
        decision: PolicyDecision,
        /// The policy agent's stated reasoning.
        reasoning: String,
        /// Follow-up steps, possibly empty.
        next_steps: Vec<String>,
    },
    /// The workflow stopped early.
    Failure {
        /// Which step failed and how.
        reason: FailureReason,
        /// Human-readable detail.
        message: String,
    },
}

impl WorkflowResult {
    /// Whether the run ended in `COMPLETE`.
    pub fn is_success(&self) -> bool {
        matches!(self, WorkflowResult::Success { .. })
    }

    /// The reason code of a failure, `None` on success.
    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            WorkflowResult::Failure { reason, .. } => Some(*reason),
            WorkflowResult::Success { .. } => None,
        }
    }
}

/// Execution context of one dispute, from `INIT` to a terminal state.
///
/// Owned by a single workflow run; never shared between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Unique id of this run.
    pub id: Uuid,
    /// The request being adjudicated.
    pub request: DisputeRequest,
    /// Current state.
    pub state: WorkflowState,
    /// The resolved transaction, kept even when a later step fails.
    pub transaction_details: Option<TransactionDetails>,
    /// The policy agent's full answer.
    pub policy_result: Option<PolicyCheckResponse>,
    /// Set once a terminal state is reached.
    pub outcome: Option<WorkflowResult>,
    /// Every state entered, in order, starting with `INIT`.
    pub history: Vec<WorkflowState>,
    /// Remote operations attempted by this run.
    pub remote_calls: u32,
    /// When the run was created.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowInstance {
    /// A fresh instance in `INIT`.
    pub fn new(request: DisputeRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            state: WorkflowState::Init,
            transaction_details: None,
            policy_result: None,
            outcome: None,
            history: vec![WorkflowState::Init],
            remote_calls: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Whether the instance has reached `COMPLETE` or `FAILED`.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether the run ever entered `state`.
    pub fn visited(&self, state: WorkflowState) -> bool {
        self.history.contains(&state)
    }

    /// Move to a non-terminal successor state.
    pub(crate) fn transition(&mut self, next: WorkflowState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {next}",
            self.state
        );
        self.state = next;
        self.history.push(next);
    }

    /// Record the policy answer and finish successfully.
    pub(crate) fn complete(&mut self, policy: PolicyCheckResponse) {
        self.outcome = Some(WorkflowResult::Success {
            decision: policy.policy_decision,
            reasoning: policy.reasoning.clone(),
            next_steps: policy.next_steps.clone(),
        });
        self.policy_result = Some(policy);
        self.transition(WorkflowState::Complete);
        self.finished_at = Some(Utc::now());
    }

    /// Finish with `reason`. No-op once terminal, so the first failure wins.
    pub(crate) fn fail(&mut self, reason: FailureReason, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        self.outcome = Some(WorkflowResult::Failure {
            reason,
            message: message.into(),
        });
        self.transition(WorkflowState::Failed);
        self.finished_at = Some(Utc::now());
    }
}
