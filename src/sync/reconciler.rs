use std::sync::Arc;

use log::{debug, info, warn};

use crate::configuration::types::RetryPolicy;
use crate::error_handling::types::{BackendError, QueueError, SyncError};
use crate::queue::queue_trait::ArtifactQueue;
use crate::queue::types::{AudioNote, CaptureArtifact, SyncStatus};
use crate::sync::backend::{AudioUpload, CaseBackend, UploadRequest};

/// Aggregate outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub uploaded_count: usize,
    pub failed_count: usize,
    pub audio_uploaded: bool,
    pub transcript: Option<String>,
}

/// Drains a session's artifacts against the remote service.
///
/// Uploads run in capture order with per-item failure isolation: a failed
/// artifact is marked `Failed`, stays in the durable queue for a later pass,
/// and never blocks the rest of the batch. The audio note, if any, is
/// uploaded strictly after every photo attempt so the remote side can
/// correlate transcript segments with photo offsets. Only total inability to
/// reach the service is surfaced as an error.
pub struct UploadReconciler {
    backend: Arc<dyn CaseBackend>,
    queue: Arc<dyn ArtifactQueue>,
    retry: RetryPolicy,
}

impl UploadReconciler {
    pub fn new(
        backend: Arc<dyn CaseBackend>,
        queue: Arc<dyn ArtifactQueue>,
        retry: RetryPolicy,
    ) -> Self {
        Self { backend, queue, retry }
    }

    /// At-least-once batch upload with partial-failure accounting.
    ///
    /// `remote_session_id` is the id handed out by the backend at session
    /// start. Artifacts already marked `Uploaded` are skipped, which makes a
    /// repeated pass over a partially synced working set safe.
    pub async fn reconcile(
        &self,
        remote_session_id: &str,
        artifacts: &mut [CaptureArtifact],
        audio: Option<&mut AudioNote>,
    ) -> Result<ReconcileReport, SyncError> {
        let mut report = ReconcileReport::default();
        let mut attempted = 0usize;
        let mut unreachable = 0usize;

        for artifact in artifacts.iter_mut() {
            if artifact.sync_status == SyncStatus::Uploaded {
                continue;
            }
            attempted += 1;
            artifact.sync_status = SyncStatus::Uploading;

            let request = UploadRequest::from_artifact(remote_session_id, artifact);
            match self.try_with_retry(request).await {
                Ok(()) => {
                    artifact.sync_status = SyncStatus::Uploaded;
                    report.uploaded_count += 1;
                    match self.queue.delete(&artifact.case_id, artifact.id).await {
                        Ok(()) | Err(QueueError::NotFound) => {}
                        Err(e) => return Err(SyncError::Queue(e)),
                    }
                    debug!("uploaded artifact {}", artifact.id);
                }
                Err(e) => {
                    if e.is_unreachable() {
                        unreachable += 1;
                    }
                    warn!("upload of artifact {} failed: {}", artifact.id, e);
                    artifact.sync_status = SyncStatus::Failed;
                    report.failed_count += 1;
                    // Persist the status so a later pass sees the failure.
                    self.queue.save(&artifact.case_id, artifact).await?;
                }
            }
        }

        // Audio goes last: every photo attempt has completed by now.
        if let Some(note) = audio {
            attempted += 1;
            match self.try_audio_with_retry(remote_session_id, note).await {
                Ok(transcript) => {
                    if transcript.is_none() {
                        info!("audio note uploaded, transcript pending remotely");
                    }
                    note.transcript = transcript.clone();
                    report.audio_uploaded = true;
                    report.transcript = transcript;
                    self.queue.delete_audio_note(&note.case_id).await?;
                }
                Err(e) => {
                    if e.is_unreachable() {
                        unreachable += 1;
                    }
                    warn!("audio note upload failed: {}", e);
                }
            }
        }

        if attempted > 0 && unreachable == attempted {
            return Err(SyncError::BackendUnreachable);
        }

        info!(
            "reconciliation done: {} uploaded, {} failed, audio_uploaded={}",
            report.uploaded_count, report.failed_count, report.audio_uploaded
        );
        Ok(report)
    }

    async fn try_with_retry(&self, request: UploadRequest) -> Result<(), BackendError> {
        let mut attempt = 1u32;
        loop {
            match self.backend.upload_artifact(request.clone()).await {
                Ok(()) => return Ok(()),
                // Transport failures may be momentary; rejections are final.
                Err(e) if e.is_unreachable() && attempt < self.retry.max_attempts => {
                    tokio::time::sleep(self.retry.delay_before(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_audio_with_retry(
        &self,
        session_id: &str,
        note: &AudioNote,
    ) -> Result<Option<String>, BackendError> {
        let upload = AudioUpload {
            payload: note.payload.clone(),
            started_at: note.started_at,
            duration_secs: note.duration_secs,
        };
        let mut attempt = 1u32;
        loop {
            match self.backend.upload_audio_note(session_id, upload.clone()).await {
                Ok(transcript) => return Ok(transcript),
                Err(e) if e.is_unreachable() && attempt < self.retry.max_attempts => {
                    tokio::time::sleep(self.retry.delay_before(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
