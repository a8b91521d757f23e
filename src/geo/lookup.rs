use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, trace};

use super::{GeoFix, GeoPoint};

/// Platform location capability.
///
/// Implementations wrap whatever positioning hardware or service the device
/// offers. Returning `None` covers every failure mode: no capability,
/// permission denied, no fix available.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    async fn current_fix(&self) -> Option<GeoPoint>;
}

/// Cached, time-bounded location resolution over an injected [`GeoProvider`].
///
/// `resolve` never errors and never exceeds its timeout. A fix younger than
/// `max_age` is served from the cache without waking the hardware again.
pub struct GeoLookup {
    provider: Arc<dyn GeoProvider>,
    last_fix: Mutex<Option<GeoFix>>,
}

impl GeoLookup {
    pub fn new(provider: Arc<dyn GeoProvider>) -> Self {
        Self {
            provider,
            last_fix: Mutex::new(None),
        }
    }

    /// Resolves the device location, bounded by `timeout`.
    ///
    /// Returns `None` on timeout or when the provider has nothing to offer.
    /// A successful lookup refreshes the cache.
    pub async fn resolve(&self, timeout: Duration, max_age: Duration) -> Option<GeoPoint> {
        if let Some(cached) = self.fresh_cached(max_age) {
            trace!("serving cached location fix");
            return Some(cached);
        }

        match tokio::time::timeout(timeout, self.provider.current_fix()).await {
            Ok(Some(point)) => {
                if let Ok(mut guard) = self.last_fix.lock() {
                    *guard = Some(GeoFix {
                        point,
                        acquired_at: Utc::now(),
                    });
                }
                Some(point)
            }
            Ok(None) => {
                debug!("location provider returned no fix");
                None
            }
            Err(_) => {
                debug!("location lookup timed out after {:?}", timeout);
                None
            }
        }
    }

    fn fresh_cached(&self, max_age: Duration) -> Option<GeoPoint> {
        let guard = self.last_fix.lock().ok()?;
        let fix = guard.as_ref()?;
        let age = Utc::now().signed_duration_since(fix.acquired_at);
        let max_age = chrono::Duration::from_std(max_age).ok()?;
        if age <= max_age {
            Some(fix.point)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        point: Option<GeoPoint>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl FixedProvider {
        fn new(point: Option<GeoPoint>) -> Self {
            Self {
                point,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }

        fn slow(point: Option<GeoPoint>, delay: Duration) -> Self {
            Self {
                point,
                calls: AtomicUsize::new(0),
                delay,
            }
        }
    }

    #[async_trait]
    impl GeoProvider for FixedProvider {
        async fn current_fix(&self) -> Option<GeoPoint> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.point
        }
    }

    #[tokio::test]
    async fn test_resolve_returns_fix() {
        let point = GeoPoint { lat: 46.2, lng: 6.1 };
        let lookup = GeoLookup::new(Arc::new(FixedProvider::new(Some(point))));
        let got = lookup
            .resolve(Duration::from_secs(1), Duration::ZERO)
            .await;
        assert_eq!(got, Some(point));
    }

    #[tokio::test]
    async fn test_resolve_none_on_missing_capability() {
        let lookup = GeoLookup::new(Arc::new(FixedProvider::new(None)));
        let got = lookup
            .resolve(Duration::from_secs(1), Duration::ZERO)
            .await;
        assert_eq!(got, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_none_on_timeout() {
        let point = GeoPoint { lat: 1.0, lng: 2.0 };
        let provider = FixedProvider::slow(Some(point), Duration::from_secs(5));
        let lookup = GeoLookup::new(Arc::new(provider));
        let got = lookup
            .resolve(Duration::from_secs(1), Duration::ZERO)
            .await;
        assert_eq!(got, None);
    }

    #[tokio::test]
    async fn test_cached_fix_avoids_second_provider_call() {
        let point = GeoPoint { lat: 46.2, lng: 6.1 };
        let provider = Arc::new(FixedProvider::new(Some(point)));
        let lookup = GeoLookup::new(provider.clone());

        let first = lookup
            .resolve(Duration::from_secs(1), Duration::from_secs(60))
            .await;
        let second = lookup
            .resolve(Duration::from_secs(1), Duration::from_secs(60))
            .await;

        assert_eq!(first, Some(point));
        assert_eq!(second, Some(point));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
