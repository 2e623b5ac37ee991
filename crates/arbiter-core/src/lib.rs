//! Core types and error definitions for Arbiter.
//!
//! This crate provides the types shared across all Arbiter crates: the
//! registry's view of a remote agent, the self-description document agents
//! publish, and the wire models exchanged with the dispute agents.
//!
//! # Main types
//!
//! - [`ArbiterError`]: Unified error enum for all Arbiter subsystems.
//! - [`ArbiterResult`]: Convenience alias for `Result<T, ArbiterError>`.
//! - [`AgentDescriptor`]: Identity and liveness record for one remote agent.
//! - [`AgentCard`]: The self-description document fetched from an agent.
//! - [`AgentDirectory`]: Source of active-agent snapshots for workflows.
//! - [`TransactionDetails`] / [`PolicyCheckResponse`]: Dispute wire models.

/// Agent descriptors, liveness status and self-description documents.
pub mod agent;
/// The directory seam through which workflows find agents.
pub mod directory;
/// Wire models for the transaction-detail and dispute-policy agents.
pub mod dispute;

pub use agent::{AgentCard, AgentDescriptor, AgentStatus, CapabilityRef};
pub use directory::AgentDirectory;
pub use dispute::{
    PolicyCheckRequest, PolicyCheckResponse, PolicyDecision, QueryRequest, QueryResponse,
    TransactionDetails,
};

// --- Error types ---

/// Top-level error type for Arbiter.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum ArbiterError {
    /// An error from the registry store or a liveness poller.
    #[error("Registry error: {0}")]
    Registry(String),

    /// An error while querying a discovery service (local or remote).
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// An error from an outbound HTTP request.
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from the workflow engine itself (not a workflow failure).
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// An error from the HTTP gateway layer.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`ArbiterError`].
pub type ArbiterResult<T> = Result<T, ArbiterError>;
