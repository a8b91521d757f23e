//! Camera and microphone resource management.
//!
//! The platform capture capability is modeled as an injected trait so tests
//! and headless builds can substitute their own implementation. The manager
//! layered on top enforces the single-lease contract and the bounded retry
//! policy for transient acquisition failures.

/// Submodule for the lease manager.
pub mod manager;
/// Submodule for hardware capability types.
pub mod types;
