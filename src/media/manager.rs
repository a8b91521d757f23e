use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::configuration::types::RetryPolicy;
use crate::error_handling::types::CaptureError;
use crate::media::types::{
    Facing, MediaAvailability, MediaCapability, StreamConstraints, StreamHandle,
};

/// Manages the exclusive camera+microphone lease for one capture session.
///
/// Acquisition first asks for the preferred facing direction and falls back
/// to an unconstrained request before surfacing an error. Transient timeouts
/// are retried under the configured [`RetryPolicy`]; permission and hardware
/// errors are surfaced immediately. Whatever happens, at most one lease is
/// live at a time: acquiring releases the prior handle first, and `release`
/// is idempotent on every exit path.
pub struct MediaResourceManager {
    capability: Arc<dyn MediaCapability>,
    retry: RetryPolicy,
    active: Mutex<Option<StreamHandle>>,
    camera_ready: AtomicBool,
}

impl MediaResourceManager {
    pub fn new(capability: Arc<dyn MediaCapability>, retry: RetryPolicy) -> Self {
        Self {
            capability,
            retry,
            active: Mutex::new(None),
            camera_ready: AtomicBool::new(false),
        }
    }

    /// Acquires a stream, preferring `facing`. Releases any prior lease.
    pub async fn acquire(&self, facing: Facing) -> Result<StreamHandle, CaptureError> {
        if let MediaAvailability::Unavailable(reason) = self.capability.availability() {
            warn!("capture capability unavailable: {}", reason);
            return Err(CaptureError::ApiUnavailable);
        }

        // Never two live leases: drop the previous one before asking again.
        let prior = self.take_active();
        if let Some(handle) = prior {
            debug!("releasing prior stream {} before re-acquisition", handle.id);
            self.capability.close_stream(&handle).await;
            self.camera_ready.store(false, Ordering::SeqCst);
        }

        let constrained = StreamConstraints::preferring(facing);
        let mut attempt = 1u32;
        loop {
            let err = match self.capability.open_stream(&constrained).await {
                Ok(handle) => return Ok(self.adopt(handle)),
                Err(first) => {
                    debug!("constrained acquisition failed ({}), trying unconstrained", first);
                    match self
                        .capability
                        .open_stream(&StreamConstraints::unconstrained())
                        .await
                    {
                        Ok(handle) => {
                            warn!("acquired stream without facing constraint");
                            return Ok(self.adopt(handle));
                        }
                        Err(second) => second,
                    }
                }
            };

            if err == CaptureError::AcquisitionTimeout && attempt < self.retry.max_attempts {
                let delay = self.retry.delay_before(attempt);
                debug!("acquisition timed out, retry {} after {:?}", attempt + 1, delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            return Err(err);
        }
    }

    /// Releases `handle` if it is the live lease. Safe to call repeatedly or
    /// with a stale handle.
    pub async fn release(&self, handle: &StreamHandle) {
        let live = {
            let mut guard = match self.active.lock() {
                Ok(g) => g,
                Err(p) => p.into_inner(),
            };
            match *guard {
                Some(current) if current.id == handle.id => guard.take(),
                _ => None,
            }
        };
        if let Some(current) = live {
            info!("releasing capture stream {}", current.id);
            self.capability.close_stream(&current).await;
            self.camera_ready.store(false, Ordering::SeqCst);
        }
    }

    /// Indicator toggled with the lease, observed by the capture session UI.
    pub fn is_camera_ready(&self) -> bool {
        self.camera_ready.load(Ordering::SeqCst)
    }

    pub fn has_live_lease(&self) -> bool {
        match self.active.lock() {
            Ok(guard) => guard.is_some(),
            Err(p) => p.into_inner().is_some(),
        }
    }

    pub async fn capture_frame(&self, handle: &StreamHandle) -> Result<Vec<u8>, CaptureError> {
        self.capability.capture_frame(handle).await
    }

    pub async fn begin_audio(&self, handle: &StreamHandle) -> Result<(), CaptureError> {
        self.capability.begin_audio(handle).await
    }

    pub async fn end_audio(&self, handle: &StreamHandle) -> Result<Vec<u8>, CaptureError> {
        self.capability.end_audio(handle).await
    }

    fn adopt(&self, handle: StreamHandle) -> StreamHandle {
        if let Ok(mut guard) = self.active.lock() {
            *guard = Some(handle);
        }
        self.camera_ready.store(true, Ordering::SeqCst);
        info!("capture stream {} acquired ({:?})", handle.id, handle.facing);
        handle
    }

    fn take_active(&self) -> Option<StreamHandle> {
        match self.active.lock() {
            Ok(mut guard) => guard.take(),
            Err(p) => p.into_inner().take(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicIsize;
    use uuid::Uuid;

    /// Scripted capability: pops one result per open attempt and tracks the
    /// number of simultaneously live streams.
    struct ScriptedCapability {
        script: Mutex<VecDeque<Result<Facing, CaptureError>>>,
        live: AtomicIsize,
        max_live: AtomicIsize,
        availability: MediaAvailability,
    }

    impl ScriptedCapability {
        fn new(script: Vec<Result<Facing, CaptureError>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                live: AtomicIsize::new(0),
                max_live: AtomicIsize::new(0),
                availability: MediaAvailability::Available,
            }
        }

        fn unavailable(reason: &str) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                live: AtomicIsize::new(0),
                max_live: AtomicIsize::new(0),
                availability: MediaAvailability::Unavailable(reason.into()),
            }
        }
    }

    #[async_trait]
    impl MediaCapability for ScriptedCapability {
        fn availability(&self) -> MediaAvailability {
            self.availability.clone()
        }

        async fn open_stream(
            &self,
            _constraints: &StreamConstraints,
        ) -> Result<StreamHandle, CaptureError> {
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(CaptureError::DeviceNotFound));
            match next {
                Ok(facing) => {
                    let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
                    self.max_live.fetch_max(live, Ordering::SeqCst);
                    Ok(StreamHandle {
                        id: Uuid::new_v4(),
                        facing,
                    })
                }
                Err(e) => Err(e),
            }
        }

        async fn close_stream(&self, _handle: &StreamHandle) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }

        async fn capture_frame(&self, _handle: &StreamHandle) -> Result<Vec<u8>, CaptureError> {
            Ok(b"frame".to_vec())
        }

        async fn begin_audio(&self, _handle: &StreamHandle) -> Result<(), CaptureError> {
            Ok(())
        }

        async fn end_audio(&self, _handle: &StreamHandle) -> Result<Vec<u8>, CaptureError> {
            Ok(b"audio".to_vec())
        }
    }

    #[tokio::test]
    async fn test_acquire_prefers_constrained_request() {
        let cap = Arc::new(ScriptedCapability::new(vec![Ok(Facing::Back)]));
        let manager = MediaResourceManager::new(cap.clone(), RetryPolicy::once());
        let handle = manager.acquire(Facing::Back).await.unwrap();
        assert_eq!(handle.facing, Facing::Back);
        assert!(manager.is_camera_ready());
    }

    #[tokio::test]
    async fn test_acquire_falls_back_to_unconstrained() {
        let cap = Arc::new(ScriptedCapability::new(vec![
            Err(CaptureError::DeviceNotFound),
            Ok(Facing::Front),
        ]));
        let manager = MediaResourceManager::new(cap, RetryPolicy::once());
        let handle = manager.acquire(Facing::Back).await.unwrap();
        assert_eq!(handle.facing, Facing::Front);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_retries_transient_timeouts() {
        let cap = Arc::new(ScriptedCapability::new(vec![
            Err(CaptureError::AcquisitionTimeout),
            Err(CaptureError::AcquisitionTimeout),
            Ok(Facing::Back),
        ]));
        let manager = MediaResourceManager::new(cap, RetryPolicy::new(2, 100));
        let handle = manager.acquire(Facing::Back).await.unwrap();
        assert_eq!(handle.facing, Facing::Back);
    }

    #[tokio::test]
    async fn test_permission_denied_is_not_auto_retried() {
        let cap = Arc::new(ScriptedCapability::new(vec![
            Err(CaptureError::PermissionDenied),
            Err(CaptureError::PermissionDenied),
        ]));
        let manager = MediaResourceManager::new(cap, RetryPolicy::new(5, 10));
        let err = manager.acquire(Facing::Back).await.unwrap_err();
        assert_eq!(err, CaptureError::PermissionDenied);
    }

    #[tokio::test]
    async fn test_unavailable_api_is_fatal() {
        let cap = Arc::new(ScriptedCapability::unavailable("no capture stack"));
        let manager = MediaResourceManager::new(cap, RetryPolicy::once());
        let err = manager.acquire(Facing::Back).await.unwrap_err();
        assert_eq!(err, CaptureError::ApiUnavailable);
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_facing_switches_never_overlap_leases() {
        let cap = Arc::new(ScriptedCapability::new(vec![
            Ok(Facing::Back),
            Ok(Facing::Front),
            Ok(Facing::Back),
        ]));
        let manager = MediaResourceManager::new(cap.clone(), RetryPolicy::once());

        let h1 = manager.acquire(Facing::Back).await.unwrap();
        let h2 = manager.acquire(h1.facing.opposite()).await.unwrap();
        let _h3 = manager.acquire(h2.facing.opposite()).await.unwrap();

        assert_eq!(cap.max_live.load(Ordering::SeqCst), 1);
        assert_eq!(cap.live.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_is_idempotent_and_ignores_stale_handles() {
        let cap = Arc::new(ScriptedCapability::new(vec![Ok(Facing::Back)]));
        let manager = MediaResourceManager::new(cap.clone(), RetryPolicy::once());
        let handle = manager.acquire(Facing::Back).await.unwrap();

        manager.release(&handle).await;
        manager.release(&handle).await;
        let stale = StreamHandle {
            id: Uuid::new_v4(),
            facing: Facing::Back,
        };
        manager.release(&stale).await;

        assert_eq!(cap.live.load(Ordering::SeqCst), 0);
        assert!(!manager.is_camera_ready());
        assert!(!manager.has_live_lease());
    }
}
