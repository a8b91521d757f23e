//! Capture session core module.
//!
//! This module provides the capture session state machine binding hardware
//! capture, durable queueing, geolocation and remote synchronization into a
//! single workflow: start, shoot, record, edit, finish.

use serde::{Deserialize, Serialize};

/// Submodule implementing the session aggregate.
pub mod capture_session;

/// Lifecycle state of a capture session.
///
/// `Blocked` is the error sink reached from `PreCapture`/`Capturing` on a
/// fatal hardware error; `retry` returns to the prior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    PreCapture,
    Capturing,
    Reviewing,
    Editing,
    Uploading,
    Completed,
    Blocked,
}
