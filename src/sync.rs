//! Remote synchronization.
//!
//! The backend client interface consumed by the engine and the reconciler
//! that drains the durable queue against it with per-item failure isolation.

/// Submodule defining the case-management backend interface.
pub mod backend;
/// Submodule for the batch upload reconciler.
pub mod reconciler;
