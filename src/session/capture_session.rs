use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::configuration::config::EngineConfig;
use crate::error_handling::types::{QueueError, SessionError};
use crate::geo::lookup::GeoLookup;
use crate::geo::GeoPoint;
use crate::media::manager::MediaResourceManager;
use crate::media::types::{Facing, StreamHandle};
use crate::queue::queue_trait::ArtifactQueue;
use crate::queue::types::{AudioNote, CaptureArtifact, SyncStatus};
use crate::session::SessionState;
use crate::sync::backend::CaseBackend;
use crate::sync::reconciler::{ReconcileReport, UploadReconciler};

/// The capture session aggregate.
///
/// Owns the working set of artifacts for one case, the exclusive media
/// lease, and the geolocation side channel, and drives the state machine
/// `PreCapture → Capturing → Reviewing ⇄ Editing → Uploading → Completed`
/// (with the `Blocked` sink for fatal hardware errors).
///
/// Ordering discipline:
/// - an artifact is durably queued before it joins the working set
/// - the shutter path never awaits geolocation; fixes arrive over a channel
///   and are applied when leaving `Capturing` and once more when upload
///   starts, after which late fixes are discarded
/// - the media lease is released whenever `Capturing` is left, on any path
pub struct CaptureSession {
    id: Uuid,
    case_id: String,
    state: SessionState,
    blocked_from: Option<SessionState>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    remote_session_id: Option<String>,
    working: Vec<CaptureArtifact>,
    audio: Option<AudioNote>,
    recording_since: Option<DateTime<Utc>>,
    capture_started_at: Option<DateTime<Utc>>,
    handle: Option<StreamHandle>,
    media: Arc<MediaResourceManager>,
    geo: Arc<GeoLookup>,
    queue: Arc<dyn ArtifactQueue>,
    backend: Arc<dyn CaseBackend>,
    config: EngineConfig,
    geo_tx: Option<mpsc::UnboundedSender<(Uuid, GeoPoint)>>,
    geo_rx: Option<mpsc::UnboundedReceiver<(Uuid, GeoPoint)>>,
}

impl CaptureSession {
    /// Creates a session bound to `case_id`.
    ///
    /// A non-empty case id is a hard precondition: no hardware is requested
    /// and nothing is persisted without a bound case.
    pub fn new(
        case_id: &str,
        media: Arc<MediaResourceManager>,
        geo: Arc<GeoLookup>,
        queue: Arc<dyn ArtifactQueue>,
        backend: Arc<dyn CaseBackend>,
        config: EngineConfig,
    ) -> Result<Self, SessionError> {
        if case_id.trim().is_empty() {
            return Err(SessionError::MissingCaseId);
        }
        let (geo_tx, geo_rx) = mpsc::unbounded_channel();
        Ok(Self {
            id: Uuid::new_v4(),
            case_id: case_id.to_string(),
            state: SessionState::PreCapture,
            blocked_from: None,
            created_at: Utc::now(),
            completed_at: None,
            remote_session_id: None,
            working: Vec::new(),
            audio: None,
            recording_since: None,
            capture_started_at: None,
            handle: None,
            media,
            geo,
            queue,
            backend,
            config,
            geo_tx: Some(geo_tx),
            geo_rx: Some(geo_rx),
        })
    }

    /// `PreCapture → Capturing`: rehydrates queue leftovers for the case,
    /// requests a remote session id, then acquires the hardware lease.
    ///
    /// A fatal hardware error parks the session in `Blocked`; recoverable
    /// errors leave it in `PreCapture` so the caller can try again.
    pub async fn begin_capture(&mut self, facing: Facing) -> Result<(), SessionError> {
        if self.state != SessionState::PreCapture {
            return Err(SessionError::InvalidTransition("begin_capture"));
        }

        // Crash recovery: anything already queued for this case belongs to
        // the working set before new capture begins.
        let leftovers = self.queue.list(&self.case_id).await?;
        if !leftovers.is_empty() {
            info!(
                "[{}] rehydrated {} queued artifact(s) for case {}",
                self.id,
                leftovers.len(),
                self.case_id
            );
        }
        self.working = leftovers;
        if self.audio.is_none() {
            self.audio = self.queue.load_audio_note(&self.case_id).await?;
        }

        if self.remote_session_id.is_none() {
            let remote = self.backend.create_session(&self.case_id).await?;
            debug!("[{}] remote session {}", self.id, remote);
            self.remote_session_id = Some(remote);
        }

        match self.media.acquire(facing).await {
            Ok(handle) => {
                self.handle = Some(handle);
                self.capture_started_at = Some(Utc::now());
                self.state = SessionState::Capturing;
                Ok(())
            }
            Err(e) if e.is_fatal() => {
                error!("[{}] capture blocked: {}", self.id, e);
                self.blocked_from = Some(SessionState::PreCapture);
                self.state = SessionState::Blocked;
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Shutter action: captures a frame, durably queues it, appends it to
    /// the working set and fires the geolocation side channel. Never waits
    /// on geolocation.
    pub async fn capture_photo(&mut self) -> Result<Uuid, SessionError> {
        if self.state != SessionState::Capturing {
            return Err(SessionError::InvalidTransition("capture_photo"));
        }
        let handle = self
            .handle
            .ok_or(SessionError::InvalidTransition("capture_photo"))?;

        let frame = self.media.capture_frame(&handle).await?;
        let artifact =
            CaptureArtifact::new(self.id, &self.case_id, frame, self.session_offset_secs());

        // Durability happens-before working-set membership.
        self.queue.save(&self.case_id, &artifact).await?;
        let artifact_id = artifact.id;
        self.working.push(artifact);

        if let Some(tx) = self.geo_tx.clone() {
            let geo = Arc::clone(&self.geo);
            let timeout = self.config.geo_timeout();
            let max_age = self.config.geo_max_age();
            tokio::spawn(async move {
                if let Some(point) = geo.resolve(timeout, max_age).await {
                    // Receiver may be gone if upload already started.
                    let _ = tx.send((artifact_id, point));
                }
            });
        }

        debug!("[{}] captured artifact {}", self.id, artifact_id);
        Ok(artifact_id)
    }

    /// Re-acquires the stream with the opposite facing direction. The
    /// manager releases the prior lease before the new one goes live, so on
    /// failure the old handle is already dead: the session falls back to the
    /// facing it had, and blocks if that cannot be recovered either.
    pub async fn switch_facing(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Capturing {
            return Err(SessionError::InvalidTransition("switch_facing"));
        }
        let current = self
            .handle
            .ok_or(SessionError::InvalidTransition("switch_facing"))?;
        match self.media.acquire(current.facing.opposite()).await {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) if e.is_fatal() => {
                error!("[{}] facing switch blocked: {}", self.id, e);
                self.handle = None;
                self.blocked_from = Some(SessionState::Capturing);
                self.state = SessionState::Blocked;
                Err(e.into())
            }
            Err(e) => {
                self.handle = None;
                match self.media.acquire(current.facing).await {
                    Ok(handle) => {
                        warn!(
                            "[{}] facing switch failed ({}), staying on {:?}",
                            self.id, e, current.facing
                        );
                        self.handle = Some(handle);
                    }
                    Err(restore) => {
                        error!(
                            "[{}] facing switch failed and re-acquisition failed: {}",
                            self.id, restore
                        );
                        self.blocked_from = Some(SessionState::Capturing);
                        self.state = SessionState::Blocked;
                    }
                }
                Err(e.into())
            }
        }
    }

    /// Starts the (single) voice note of this session.
    pub async fn start_audio_note(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Capturing {
            return Err(SessionError::InvalidTransition("start_audio_note"));
        }
        if self.audio.is_some() || self.recording_since.is_some() {
            return Err(SessionError::InvalidTransition("start_audio_note"));
        }
        let handle = self
            .handle
            .ok_or(SessionError::InvalidTransition("start_audio_note"))?;
        self.media.begin_audio(&handle).await?;
        self.recording_since = Some(Utc::now());
        Ok(())
    }

    /// Stops the recording and durably persists the finished note.
    pub async fn stop_audio_note(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Capturing {
            return Err(SessionError::InvalidTransition("stop_audio_note"));
        }
        let started_at = self
            .recording_since
            .take()
            .ok_or(SessionError::InvalidTransition("stop_audio_note"))?;
        let handle = self
            .handle
            .ok_or(SessionError::InvalidTransition("stop_audio_note"))?;
        let payload = self.media.end_audio(&handle).await?;
        let duration = Utc::now().signed_duration_since(started_at);
        let note = AudioNote {
            session_id: self.id,
            case_id: self.case_id.clone(),
            payload,
            started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            transcript: None,
        };
        self.queue.save_audio_note(&note).await?;
        self.audio = Some(note);
        Ok(())
    }

    /// `Capturing → Reviewing`: stops a live recording, releases the media
    /// lease and applies any location fixes that arrived in the meantime.
    pub async fn finish_capture(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Capturing {
            return Err(SessionError::InvalidTransition("finish_capture"));
        }
        if self.recording_since.is_some() {
            self.stop_audio_note().await?;
        }
        self.release_media().await;
        self.apply_pending_locations().await;
        self.state = SessionState::Reviewing;
        Ok(())
    }

    /// `Reviewing → Editing`.
    pub fn begin_editing(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Reviewing {
            return Err(SessionError::InvalidTransition("begin_editing"));
        }
        self.state = SessionState::Editing;
        Ok(())
    }

    /// `Editing → Reviewing`.
    pub fn finish_editing(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Editing {
            return Err(SessionError::InvalidTransition("finish_editing"));
        }
        self.state = SessionState::Reviewing;
        Ok(())
    }

    /// Sets the annotation of a working artifact and re-persists it.
    pub async fn annotate(&mut self, artifact_id: Uuid, text: &str) -> Result<(), SessionError> {
        if self.state != SessionState::Reviewing && self.state != SessionState::Editing {
            return Err(SessionError::InvalidTransition("annotate"));
        }
        let case_id = self.case_id.clone();
        let artifact = self
            .working
            .iter_mut()
            .find(|a| a.id == artifact_id)
            .ok_or(SessionError::Queue(QueueError::NotFound))?;
        artifact.annotation = text.to_string();
        let snapshot = artifact.clone();
        self.queue.save(&case_id, &snapshot).await?;
        Ok(())
    }

    /// Deletes an artifact from the durable queue and the working set.
    ///
    /// Queue first: once the artifact leaves the visible set there must be
    /// no orphaned payload left behind.
    pub async fn delete_artifact(&mut self, artifact_id: Uuid) -> Result<(), SessionError> {
        if self.state != SessionState::Reviewing && self.state != SessionState::Editing {
            return Err(SessionError::InvalidTransition("delete_artifact"));
        }
        if !self.working.iter().any(|a| a.id == artifact_id) {
            return Err(SessionError::Queue(QueueError::NotFound));
        }
        match self.queue.delete(&self.case_id, artifact_id).await {
            Ok(()) | Err(QueueError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
        self.working.retain(|a| a.id != artifact_id);
        info!("[{}] deleted artifact {}", self.id, artifact_id);
        Ok(())
    }

    /// `Reviewing → Uploading → Completed`: reconciles the working set with
    /// the remote service and signals session completion exactly once.
    ///
    /// The location snapshot taken here is final; fixes resolving after this
    /// point are discarded. If the backend is entirely unreachable the
    /// session drops back to `Reviewing` with everything still queued.
    pub async fn upload(&mut self) -> Result<ReconcileReport, SessionError> {
        if self.state != SessionState::Reviewing {
            return Err(SessionError::InvalidTransition("upload"));
        }
        let remote_id = self
            .remote_session_id
            .clone()
            .ok_or(SessionError::InvalidTransition("upload"))?;

        self.apply_pending_locations().await;
        self.geo_rx = None;
        self.geo_tx = None;

        self.state = SessionState::Uploading;
        let reconciler = UploadReconciler::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.queue),
            self.config.upload_retry(),
        );
        let result = reconciler
            .reconcile(&remote_id, &mut self.working, self.audio.as_mut())
            .await;

        match result {
            Ok(report) => {
                self.state = SessionState::Completed;
                self.completed_at = Some(Utc::now());
                // Completion is advisory; the evidence itself is already on
                // the remote side, so a failure here is logged, not fatal.
                if let Err(e) = self.backend.complete_session(&remote_id).await {
                    warn!("[{}] session completion signal failed: {}", self.id, e);
                }
                info!(
                    "[{}] upload finished: {} ok, {} failed",
                    self.id, report.uploaded_count, report.failed_count
                );
                Ok(report)
            }
            Err(e) => {
                warn!("[{}] upload pass failed: {}", self.id, e);
                self.state = SessionState::Reviewing;
                Err(e.into())
            }
        }
    }

    /// `Blocked → prior state`: re-attempts the transition that failed.
    pub async fn retry(&mut self, facing: Facing) -> Result<(), SessionError> {
        if self.state != SessionState::Blocked {
            return Err(SessionError::InvalidTransition("retry"));
        }
        match self.blocked_from.take() {
            Some(SessionState::Capturing) => match self.media.acquire(facing).await {
                Ok(handle) => {
                    self.handle = Some(handle);
                    self.state = SessionState::Capturing;
                    Ok(())
                }
                Err(e) => {
                    self.blocked_from = Some(SessionState::Capturing);
                    Err(e.into())
                }
            },
            _ => {
                self.state = SessionState::PreCapture;
                self.begin_capture(facing).await
            }
        }
    }

    /// Flow teardown: releases the hardware lease and drops volatile state.
    /// Durable queue entries are deliberately left in place.
    pub async fn abandon(&mut self) {
        self.release_media().await;
        self.recording_since = None;
        self.working.clear();
        self.audio = None;
        self.geo_rx = None;
        self.geo_tx = None;
        info!("[{}] session abandoned, durable queue untouched", self.id);
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn remote_session_id(&self) -> Option<&str> {
        self.remote_session_id.as_deref()
    }

    pub fn artifacts(&self) -> &[CaptureArtifact] {
        &self.working
    }

    pub fn artifact_count(&self) -> usize {
        self.working.len()
    }

    pub fn audio_note(&self) -> Option<&AudioNote> {
        self.audio.as_ref()
    }

    fn session_offset_secs(&self) -> f64 {
        match self.capture_started_at {
            Some(start) => {
                Utc::now().signed_duration_since(start).num_milliseconds() as f64 / 1000.0
            }
            None => 0.0,
        }
    }

    async fn release_media(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.media.release(&handle).await;
        }
    }

    /// Drains the geolocation side channel and attaches fixes to artifacts
    /// that still exist and have not begun uploading. Persistence of a late
    /// fix is best-effort.
    async fn apply_pending_locations(&mut self) {
        let mut updates = Vec::new();
        if let Some(rx) = self.geo_rx.as_mut() {
            while let Ok(update) = rx.try_recv() {
                updates.push(update);
            }
        }
        for (artifact_id, point) in updates {
            let case_id = self.case_id.clone();
            if let Some(artifact) = self.working.iter_mut().find(|a| {
                a.id == artifact_id
                    && a.sync_status != SyncStatus::Uploaded
                    && a.sync_status != SyncStatus::Uploading
            }) {
                if artifact.location.is_none() {
                    artifact.location = Some(point);
                    let snapshot = artifact.clone();
                    if let Err(e) = self.queue.save(&case_id, &snapshot).await {
                        warn!("failed to persist location for {}: {}", artifact_id, e);
                    }
                }
            }
        }
    }
}
