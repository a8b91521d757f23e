use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error_handling::types::CaptureError;

/// Camera facing direction requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Facing {
    Front,
    Back,
}

impl Facing {
    pub fn opposite(&self) -> Facing {
        match self {
            Facing::Front => Facing::Back,
            Facing::Back => Facing::Front,
        }
    }
}

/// Constraints passed to the platform when opening a stream.
///
/// `facing: None` is the unconstrained fallback request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: Option<Facing>,
}

impl StreamConstraints {
    pub fn preferring(facing: Facing) -> Self {
        Self { facing: Some(facing) }
    }

    pub fn unconstrained() -> Self {
        Self { facing: None }
    }
}

/// Whether this platform can capture media at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaAvailability {
    Available,
    Unavailable(String),
}

/// Exclusive lease token for a live camera+microphone stream.
///
/// At most one live handle exists per capture session; the manager releases
/// any prior lease before handing out a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHandle {
    pub id: Uuid,
    pub facing: Facing,
}

/// Platform capture capability.
///
/// Implementations wrap the actual camera/microphone stack of the device.
/// All stream operations take the lease token so an implementation can
/// reject calls against a stale handle.
#[async_trait]
pub trait MediaCapability: Send + Sync {
    fn availability(&self) -> MediaAvailability;

    async fn open_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<StreamHandle, CaptureError>;

    async fn close_stream(&self, handle: &StreamHandle);

    /// Captures a single encoded frame from the live stream.
    async fn capture_frame(&self, handle: &StreamHandle) -> Result<Vec<u8>, CaptureError>;

    /// Starts microphone recording on the live stream.
    async fn begin_audio(&self, handle: &StreamHandle) -> Result<(), CaptureError>;

    /// Stops recording and returns the encoded audio payload.
    async fn end_audio(&self, handle: &StreamHandle) -> Result<Vec<u8>, CaptureError>;
}
