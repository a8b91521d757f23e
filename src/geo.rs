//! Best-effort device location resolution.
//!
//! Location is a side channel: a lookup is time-bounded, never fails loudly,
//! and the shutter path never waits on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Submodule implementing the cached, time-bounded lookup.
pub mod lookup;

/// A resolved latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// A location fix together with the wall-clock time it was acquired,
/// used to decide whether a cached value is still fresh enough.
#[derive(Debug, Clone, Copy)]
pub struct GeoFix {
    pub point: GeoPoint,
    pub acquired_at: DateTime<Utc>,
}
