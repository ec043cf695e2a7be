//! Pipeline clocks
//!
//! The control domain reads "now" through the [`Clock`] trait so the same
//! controller runs against the wall clock in production and against a stepped
//! clock in simulation and tests.

use jcut_common::RealTime;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source of pipeline time in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> RealTime;
}

/// Monotonic wall clock starting at zero when created
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> RealTime {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock advanced explicitly by whoever renders audio
///
/// Stores the `f64` bit pattern in an atomic so readers on any thread see a
/// consistent value without locking.
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(start: RealTime) -> Self {
        Self { bits: AtomicU64::new(start.to_bits()) }
    }

    pub fn set(&self, time: RealTime) {
        self.bits.store(time.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, delta: f64) -> RealTime {
        let next = self.now() + delta;
        self.set(next);
        next
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> RealTime {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// `f64` shared between domains through its bit pattern
#[derive(Debug, Default)]
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self { bits: AtomicU64::new(value.to_bits()) }
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}
