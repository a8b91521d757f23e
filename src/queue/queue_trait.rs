//! Artifact Queue Trait
//!
//! This module defines the `ArtifactQueue` trait, the interface of the
//! durable per-case evidence store.
//!
//! Implementors of this trait are responsible for:
//! - Persisting captured artifacts keyed by case, in capture order
//! - Surviving process restarts (the in-memory implementation being the
//!   deliberate exception, used for tests)
//! - Enumerating cases that still hold unsynchronized data
//! - Persisting at most one audio note per case
//!
//! All methods return a `Result` to handle potential storage errors.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error_handling::types::QueueError;
use crate::queue::types::{AudioNote, CaptureArtifact};

/// The durable evidence queue interface.
///
/// `save` is an upsert keyed by artifact id, so re-persisting an artifact
/// after a metadata change (annotation edit, late location fix, sync status
/// transition) is idempotent. `clear` is only called after every artifact of
/// a case has been confirmed uploaded.
#[async_trait]
pub trait ArtifactQueue: Send + Sync {
    /// Upserts an artifact under its case. Keeps capture order on insert.
    async fn save(&self, case_id: &str, artifact: &CaptureArtifact) -> Result<(), QueueError>;

    /// Lists the queued artifacts of a case in capture order.
    async fn list(&self, case_id: &str) -> Result<Vec<CaptureArtifact>, QueueError>;

    /// Removes a single artifact. `Err(QueueError::NotFound)` if absent.
    async fn delete(&self, case_id: &str, artifact_id: Uuid) -> Result<(), QueueError>;

    /// Removes every artifact of a case.
    async fn clear(&self, case_id: &str) -> Result<(), QueueError>;

    /// Case ids that still hold queued artifacts or an audio note.
    async fn cases_with_pending(&self) -> Result<Vec<String>, QueueError>;

    /// Persists the finished audio note of a case (at most one).
    async fn save_audio_note(&self, note: &AudioNote) -> Result<(), QueueError>;

    /// Loads the audio note of a case, if any.
    async fn load_audio_note(&self, case_id: &str) -> Result<Option<AudioNote>, QueueError>;

    /// Drops the audio note of a case once its payload has been uploaded.
    async fn delete_audio_note(&self, case_id: &str) -> Result<(), QueueError>;
}
