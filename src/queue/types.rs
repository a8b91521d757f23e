use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Synchronization state of a single captured artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    Pending,
    Uploading,
    Uploaded,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "Pending",
            SyncStatus::Uploading => "Uploading",
            SyncStatus::Uploaded => "Uploaded",
            SyncStatus::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> SyncStatus {
        match s {
            "Uploading" => SyncStatus::Uploading,
            "Uploaded" => SyncStatus::Uploaded,
            "Failed" => SyncStatus::Failed,
            _ => SyncStatus::Pending,
        }
    }
}

/// A captured photo with its metadata.
///
/// The payload is owned by the durable queue from the moment of capture
/// until the artifact is uploaded or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureArtifact {
    pub id: Uuid,
    pub session_id: Uuid,
    pub case_id: String,
    pub payload: Vec<u8>,
    pub captured_at: DateTime<Utc>,
    /// Seconds since the capture session started, used by the remote side
    /// to correlate audio transcript segments with photos.
    pub session_offset_secs: f64,
    pub location: Option<GeoPoint>,
    pub annotation: String,
    pub suggested_annotation: Option<String>,
    pub sync_status: SyncStatus,
}

impl CaptureArtifact {
    pub fn new(
        session_id: Uuid,
        case_id: &str,
        payload: Vec<u8>,
        session_offset_secs: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            case_id: case_id.to_string(),
            payload,
            captured_at: Utc::now(),
            session_offset_secs,
            location: None,
            annotation: String::new(),
            suggested_annotation: None,
            sync_status: SyncStatus::Pending,
        }
    }
}

/// A voice note recorded alongside the photos of one session.
///
/// At most one exists per session. It is uploaded only after every photo of
/// the same session has been attempted, so the remote transcription can be
/// correlated against the photo offsets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioNote {
    pub session_id: Uuid,
    pub case_id: String,
    pub payload: Vec<u8>,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub transcript: Option<String>,
}
