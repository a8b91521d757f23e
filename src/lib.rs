//! satchel — offline-first field evidence capture and sync engine.
//!
//! Binds hardware capture (camera, microphone, location) to a durable
//! per-case queue, drives the capture session state machine, and reconciles
//! queued evidence with a remote case-management service with per-item
//! failure accounting. Captured data is persisted locally before it is
//! considered part of a session, so nothing is lost to a crash or a dead
//! connection.

pub mod configuration;
pub mod error_handling;
pub mod geo;
pub mod media;
pub mod queue;
pub mod session;
pub mod sync;

pub use configuration::config::EngineConfig;
pub use configuration::types::RetryPolicy;
pub use error_handling::types::{
    BackendError, CaptureError, QueueError, SessionError, SyncError,
};
pub use geo::lookup::{GeoLookup, GeoProvider};
pub use geo::GeoPoint;
pub use media::manager::MediaResourceManager;
pub use media::types::{Facing, MediaAvailability, MediaCapability, StreamHandle};
pub use queue::memory_queue::MemoryArtifactQueue;
pub use queue::queue_trait::ArtifactQueue;
pub use queue::sqlite_queue::SqliteArtifactQueue;
pub use queue::types::{AudioNote, CaptureArtifact, SyncStatus};
pub use session::capture_session::CaptureSession;
pub use session::SessionState;
pub use sync::backend::{AudioUpload, CaseBackend, UploadRequest};
pub use sync::reconciler::{ReconcileReport, UploadReconciler};
