//! Clock sources for time accounting.
//!
//! The engine measures elapsed ticks against baselines captured at reset,
//! so all it needs from a clock is a monotonically non-decreasing `u64` per
//! core. `MonotonicClock` is the host implementation; `ManualClock` drives
//! deterministic tests and replays.

use std::sync::atomic::{AtomicU64, Ordering};

use nix::time::{clock_gettime, ClockId};

use crate::CoreId;

/// Monotonic, core-scoped tick source.
///
/// Contract: for a fixed `core`, consecutive calls never observe time going
/// backward. Implementations must not block; `now` runs inside the per-core
/// critical section on every query.
pub trait ClockSource: Send + Sync {
    /// Current tick count for `core`.
    fn now(&self, core: CoreId) -> u64;
}

/// `CLOCK_MONOTONIC` in nanosecond ticks.
///
/// A userspace process has no per-core clock register, so every core id
/// reads the same monotonic clock. That still satisfies the per-core
/// monotonicity contract.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    pub fn new() -> Self {
        Self
    }
}

impl ClockSource for MonotonicClock {
    fn now(&self, _core: CoreId) -> u64 {
        // clock_gettime cannot fail for a valid built-in clock id.
        match clock_gettime(ClockId::CLOCK_MONOTONIC) {
            Ok(ts) => ts.tv_sec() as u64 * 1_000_000_000 + ts.tv_nsec() as u64,
            Err(_) => 0,
        }
    }
}

/// Hand-driven clock for tests and replays.
///
/// Reports the same value for every core until `set` or `advance` moves it.
/// Thread-safe, so it can stand in for the host clock in concurrent tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    ticks: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the clock at `ticks`.
    pub fn starting_at(ticks: u64) -> Self {
        Self {
            ticks: AtomicU64::new(ticks),
        }
    }

    /// Move the clock to an absolute reading.
    ///
    /// Callers are responsible for never moving it backward.
    pub fn set(&self, ticks: u64) {
        self.ticks.store(ticks, Ordering::SeqCst);
    }

    /// Advance the clock by `delta` ticks and return the new reading.
    pub fn advance(&self, delta: u64) -> u64 {
        self.ticks.fetch_add(delta, Ordering::SeqCst) + delta
    }
}

impl ClockSource for ManualClock {
    fn now(&self, _core: CoreId) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}
