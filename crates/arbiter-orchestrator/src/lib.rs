//! Dispute workflow engine for Arbiter.
//!
//! Each incoming dispute runs as an independent [`WorkflowInstance`] through a
//! linear state machine: discover the required agents, look up the disputed
//! transaction (with one fallback path when the direct lookup reports
//! not-found), ask the policy agent for a decision, and stop in `COMPLETE` or
//! `FAILED` with a specific [`FailureReason`].
//!
//! # Main types
//!
//! - [`WorkflowEngine`]: Runs workflows against an [`arbiter_core::AgentDirectory`]
//!   and an [`arbiter_a2a::Invoker`].
//! - [`WorkflowInstance`]: Per-run state, gathered data and audit trail.
//! - [`WorkflowResult`]: Terminal success or failure payload.
//! - [`AgentBindings`]: The agents a run talks to, resolved at discovery.
//! - [`WorkflowMonitor`]: Outcome counters across runs.

/// Agent resolution from an active-agent snapshot.
pub mod bindings;
/// Engine settings.
pub mod config;
/// Workflow execution.
pub mod engine;
/// Outcome counters.
pub mod monitor;
/// Workflow states, reasons, requests and instances.
pub mod types;

pub use bindings::{AgentBinding, AgentBindings};
pub use config::EngineConfig;
pub use engine::{fallback_query, WorkflowEngine};
pub use monitor::{RunGuard, WorkflowMonitor, WorkflowStats};
pub use types::{DisputeRequest, FailureReason, WorkflowInstance, WorkflowResult, WorkflowState};
