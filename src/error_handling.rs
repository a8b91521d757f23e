//! Error types shared across the engine.

pub mod types;
