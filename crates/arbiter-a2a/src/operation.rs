use serde::{Deserialize, Serialize};

/// HTTP method of an operation route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMethod {
    /// Payload fields are sent as query parameters.
    Get,
    /// Payload is sent as a JSON body.
    Post,
}

/// Where an operation lives on an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// HTTP method.
    pub method: RouteMethod,
    /// Path under the agent's base URL.
    pub path: &'static str,
}

/// The logical operations the orchestrator can invoke on an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Primary lookup of one transaction by id.
    GetTransactionDetails,
    /// Fallback structured query over transactions.
    QueryTransactions,
    /// Dispute policy evaluation.
    CheckDisputePolicy,
}

impl Operation {
    /// Static operation table.
    pub fn route(self) -> Route {
        match self {
            Operation::GetTransactionDetails => Route {
                method: RouteMethod::Get,
                path: "/get_transaction_details",
            },
            Operation::QueryTransactions => Route {
                method: RouteMethod::Post,
                path: "/query_bigquery",
            },
            Operation::CheckDisputePolicy => Route {
                method: RouteMethod::Post,
                path: "/check_dispute_policy",
            },
        }
    }

    /// Capability identifier an agent advertises for this operation.
    pub fn capability(self) -> &'static str {
        match self {
            Operation::GetTransactionDetails => "get_transaction_details",
            Operation::QueryTransactions => "query_bigquery",
            Operation::CheckDisputePolicy => "check_dispute_policy",
        }
    }

    /// Full URL of this operation on the agent at `base_url`.
    pub fn url(self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.route().path)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.capability())
    }
}
