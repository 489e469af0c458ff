//! ## portsim-core::time
//! **Virtual clock for deterministic simulation**
//!
//! ### Expectations:
//! - Nanosecond resolution
//! - Never moves backwards
//! - Advanced only by the engine's run-loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Virtual time in nanoseconds since the start of the run.
pub type SimTime = u64;

pub const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// A shareable handle on the simulation's notion of "now".
#[derive(Clone, Debug, Default)]
pub struct VirtualClock {
    offset: Arc<AtomicU64>,
}

impl VirtualClock {
    /// Creates a new virtual clock starting at `start` nanoseconds.
    pub fn new(start: SimTime) -> Self {
        Self {
            offset: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Returns the current virtual time in nanoseconds.
    #[inline]
    pub fn now_ns(&self) -> SimTime {
        self.offset.load(Ordering::Acquire)
    }

    /// Advances the clock by `ns` nanoseconds.
    #[inline]
    pub fn advance(&self, ns: u64) {
        self.offset.fetch_add(ns, Ordering::Release);
    }

    /// Moves the clock forward to `at`. Earlier instants leave it untouched.
    #[inline]
    pub fn advance_to(&self, at: SimTime) {
        self.offset.fetch_max(at, Ordering::AcqRel);
    }
}

/// Time needed to serialise `size_bytes` onto a link of `rate_bps` bits per second.
///
/// Rounded up to whole nanoseconds and never shorter than one, so the result is
/// always a valid suspension.
pub fn transmission_time(size_bytes: u64, rate_bps: f64) -> Duration {
    let nanos = (size_bytes as f64 * 8.0 * NANOS_PER_SEC / rate_bps).ceil();
    Duration::from_nanos((nanos as u64).max(1))
}

#[inline]
pub fn as_secs(at: SimTime) -> f64 {
    at as f64 / NANOS_PER_SEC
}

#[inline]
pub fn from_secs(secs: f64) -> SimTime {
    (secs * NANOS_PER_SEC).round() as SimTime
}
