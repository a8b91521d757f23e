use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error_handling::types::BackendError;
use crate::geo::GeoPoint;
use crate::queue::types::CaptureArtifact;

/// One photo upload, tagged with everything the remote side needs to file it
/// under the right case and correlate it with transcript segments later.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub session_id: String,
    pub case_id: String,
    pub payload: Vec<u8>,
    pub captured_at: DateTime<Utc>,
    pub session_offset_secs: f64,
    pub location: Option<GeoPoint>,
    pub annotation: String,
}

impl UploadRequest {
    pub fn from_artifact(session_id: &str, artifact: &CaptureArtifact) -> Self {
        Self {
            session_id: session_id.to_string(),
            case_id: artifact.case_id.clone(),
            payload: artifact.payload.clone(),
            captured_at: artifact.captured_at,
            session_offset_secs: artifact.session_offset_secs,
            location: artifact.location,
            annotation: artifact.annotation.clone(),
        }
    }
}

/// Audio note payload for the transcription-capable endpoint.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub payload: Vec<u8>,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
}

/// Case-management backend, an external collaborator.
///
/// Transport and authentication are the implementor's concern; the engine
/// only relies on these four operations. `upload_audio_note` may return a
/// transcript immediately; `None` means transcription is still pending or
/// failed remotely, which this engine treats as non-fatal.
#[async_trait]
pub trait CaseBackend: Send + Sync {
    async fn create_session(&self, case_id: &str) -> Result<String, BackendError>;

    async fn complete_session(&self, session_id: &str) -> Result<(), BackendError>;

    async fn upload_artifact(&self, request: UploadRequest) -> Result<(), BackendError>;

    async fn upload_audio_note(
        &self,
        session_id: &str,
        upload: AudioUpload,
    ) -> Result<Option<String>, BackendError>;
}
