//! Time services
//!
//! A [`TimeService`] yields monotonic millisecond readings used to correlate
//! timestamps across components. Live and recording sessions use the wall
//! monotonic clock; playback sessions report recorded time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic time source, in milliseconds
pub trait TimeService: Send + Sync {
    fn now(&self) -> f64;
}

/// Milliseconds elapsed since the clock was created
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeService for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock driven by replayed records
///
/// Reports the timestamp of the most recently replayed record. Readings never
/// go backwards even if a recording holds out-of-order timestamps.
#[derive(Debug, Default)]
pub struct ReplayClock {
    bits: AtomicU64,
}

impl ReplayClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            bits: AtomicU64::new(start_ms.to_bits()),
        }
    }

    /// Advance the clock to `timestamp_ms` unless it already reads later
    pub fn advance_to(&self, timestamp_ms: f64) {
        let _ = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (timestamp_ms > f64::from_bits(current)).then(|| timestamp_ms.to_bits())
            });
    }
}

impl TimeService for ReplayClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}
