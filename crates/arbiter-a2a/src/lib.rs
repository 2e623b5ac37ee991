//! Agent-to-agent calls.
//!
//! [`A2aClient`] turns a resolved base URL plus a logical [`Operation`] into
//! one HTTP request and classifies what came back as an [`InvokeError`] when
//! it is not a usable answer. [`RemoteDirectory`] reads the active-agent
//! catalog from a registry running in another process.

/// HTTP invocation and outcome classification.
pub mod client;
/// Logical operations and their static routes.
pub mod operation;
/// Registry access over HTTP.
pub mod remote;

pub use client::{decode, A2aClient, InvokeError, Invoker};
pub use operation::{Operation, Route, RouteMethod};
pub use remote::RemoteDirectory;
