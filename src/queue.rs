//! Durable, per-case evidence queue.
//!
//! Every captured artifact is written here before it is considered part of
//! a session's working set; entries survive process restarts and are only
//! removed after a confirmed upload or an explicit user deletion.

/// Submodule for the queue interface.
pub mod queue_trait;
/// Submodule for domain types held by the queue.
pub mod types;

/// SQLite-backed implementation (the durable one).
pub mod sqlite_queue;

/// In-memory implementation for tests and ephemeral runs.
pub mod memory_queue;
