//! Engine configuration.
//!
//! Runtime parameters for the capture engine: where the durable queue lives,
//! how long the geolocation lookup may run, and the bounded retry policies
//! used for hardware acquisition and uploads.

/// Submodule holding the `EngineConfig` loader.
pub mod config;
/// Submodule for configuration value types.
pub mod types;
