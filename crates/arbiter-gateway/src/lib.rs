//! HTTP gateway for Arbiter.
//!
//! Serves the registry's discovery view and runs dispute workflows on
//! request. `/healthz` is always open; the other routes sit behind the
//! optional API-key middleware.

/// API-key authentication middleware.
pub mod middleware;
/// Router construction and handlers.
pub mod server;

pub use middleware::AuthConfig;
pub use server::{AppState, GatewayServer};
