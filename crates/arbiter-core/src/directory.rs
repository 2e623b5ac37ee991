use crate::{AgentDescriptor, ArbiterResult};
use async_trait::async_trait;

/// Where a workflow gets its snapshot of usable agents.
///
/// Implemented by the in-process discovery service and by the HTTP client of
/// a remote registry.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Copies of all agents currently marked active.
    async fn active_agents(&self) -> ArbiterResult<Vec<AgentDescriptor>>;
}
