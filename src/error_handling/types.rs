use std::fmt;

/// Errors raised while acquiring or driving the camera/microphone hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The platform has no capture API at all. Fatal, never retried.
    ApiUnavailable,
    /// The user has not granted access. Retryable once they do.
    PermissionDenied,
    /// No camera/microphone present on this device. Fatal.
    DeviceNotFound,
    /// The device did not answer in time. Transient, retryable.
    AcquisitionTimeout,
}

impl CaptureError {
    /// Fatal errors block the session until the flow is torn down;
    /// everything else may be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaptureError::ApiUnavailable | CaptureError::DeviceNotFound)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CaptureError::AcquisitionTimeout | CaptureError::PermissionDenied)
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::ApiUnavailable => write!(f, "capture API unavailable on this platform"),
            CaptureError::PermissionDenied => write!(f, "camera/microphone permission denied"),
            CaptureError::DeviceNotFound => write!(f, "no capture device found"),
            CaptureError::AcquisitionTimeout => write!(f, "capture device acquisition timed out"),
        }
    }
}

impl std::error::Error for CaptureError {}

#[derive(Debug)]
pub enum QueueError {
    ConnectionFailed,
    WriteFailed,
    ReadFailed,
    NotFound,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::ConnectionFailed => write!(f, "queue store connection failed"),
            QueueError::WriteFailed => write!(f, "queue write failed"),
            QueueError::ReadFailed => write!(f, "queue read failed"),
            QueueError::NotFound => write!(f, "queue entry not found"),
        }
    }
}

impl std::error::Error for QueueError {}

/// Errors surfaced by the case-management backend client.
#[derive(Debug, Clone)]
pub enum BackendError {
    /// Transport-level failure: the service could not be reached at all.
    Unreachable(String),
    /// The service answered but refused the operation.
    Rejected(String),
    Unauthorized,
}

impl BackendError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, BackendError::Unreachable(_))
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Unreachable(e) => write!(f, "backend unreachable: {}", e),
            BackendError::Rejected(e) => write!(f, "backend rejected the request: {}", e),
            BackendError::Unauthorized => write!(f, "backend credential rejected"),
        }
    }
}

impl std::error::Error for BackendError {}

#[derive(Debug)]
pub enum SessionError {
    /// A session must be bound to a case before anything else happens.
    MissingCaseId,
    /// The requested operation is not legal in the current state.
    InvalidTransition(&'static str),
    Capture(CaptureError),
    Queue(QueueError),
    Backend(BackendError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::MissingCaseId => write!(f, "capture session requires a case id"),
            SessionError::InvalidTransition(op) => {
                write!(f, "operation '{}' not allowed in the current session state", op)
            }
            SessionError::Capture(e) => write!(f, "capture error: {}", e),
            SessionError::Queue(e) => write!(f, "queue error: {}", e),
            SessionError::Backend(e) => write!(f, "backend error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<CaptureError> for SessionError {
    fn from(err: CaptureError) -> Self {
        SessionError::Capture(err)
    }
}

impl From<QueueError> for SessionError {
    fn from(err: QueueError) -> Self {
        SessionError::Queue(err)
    }
}

impl From<BackendError> for SessionError {
    fn from(err: BackendError) -> Self {
        SessionError::Backend(err)
    }
}

#[derive(Debug)]
pub enum SyncError {
    /// Every attempted upload failed at the transport level.
    BackendUnreachable,
    Queue(QueueError),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::BackendUnreachable => write!(f, "remote service unreachable"),
            SyncError::Queue(e) => write!(f, "queue error during reconciliation: {}", e),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<QueueError> for SyncError {
    fn from(err: QueueError) -> Self {
        SyncError::Queue(err)
    }
}

impl From<SyncError> for SessionError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::BackendUnreachable => {
                SessionError::Backend(BackendError::Unreachable("reconciliation".into()))
            }
            SyncError::Queue(e) => SessionError::Queue(e),
        }
    }
}
