use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A transaction record as returned by the transaction-detail agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetails {
    /// Caller-facing transaction identifier.
    pub transaction_id: String,
    /// Transaction amount in `currency`.
    pub amount: f64,
    /// ISO currency code.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Merchant name.
    pub merchant: String,
    /// When the transaction happened. Naive timestamps are read as UTC.
    #[serde(deserialize_with = "utc_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Settlement status, e.g. `completed` or `pending`.
    #[serde(default = "default_tx_status")]
    pub status: String,
}

fn default_currency() -> String {
    "USD".to_string()
}
fn default_tx_status() -> String {
    "completed".to_string()
}

fn utc_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

/// Body of the fallback structured query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Query expression understood by the transaction-detail agent.
    pub sql_query: String,
}

/// Result of the fallback structured query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Row count as reported by the agent.
    #[serde(default)]
    pub row_count: Option<usize>,
    /// Matching rows. Rows are kept loosely typed until a record is picked.
    pub results: Vec<serde_json::Value>,
}

/// Closed set of decisions the policy agent may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyDecision {
    /// Refund granted.
    Approved,
    /// Dispute denied.
    Rejected,
    /// Escalated to a human.
    NeedsReview,
}

impl std::fmt::Display for PolicyDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyDecision::Approved => write!(f, "Approved"),
            PolicyDecision::Rejected => write!(f, "Rejected"),
            PolicyDecision::NeedsReview => write!(f, "NeedsReview"),
        }
    }
}

/// Body sent to the policy agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyCheckRequest {
    /// The resolved transaction.
    pub transaction: TransactionDetails,
    /// Free-text dispute reason supplied by the caller.
    pub reason: String,
    /// Optional extra notes from the customer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_notes: Option<String>,
}

/// Response of the policy agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyCheckResponse {
    /// Identifier the policy agent assigned to the dispute.
    #[serde(default)]
    pub dispute_id: Option<String>,
    /// Echo of the evaluated transaction id.
    #[serde(default)]
    pub transaction_id: Option<String>,
    /// The decision.
    pub policy_decision: PolicyDecision,
    /// Why the decision was made.
    pub reasoning: String,
    /// Follow-up steps, possibly empty.
    #[serde(default, deserialize_with = "string_or_list")]
    pub next_steps: Vec<String>,
}

/// `next_steps` is published either as one string or as a list of strings.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Steps {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Steps>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Steps::One(step)) if step.trim().is_empty() => Vec::new(),
        Some(Steps::One(step)) => vec![step],
        Some(Steps::Many(steps)) => steps,
    })
}
