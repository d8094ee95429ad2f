//! Per-core counter records and the registry that owns them.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::clock::ClockSource;
use crate::CoreId;

/// Counter state for one core. All access goes through [`CoreRecord::lock`].
#[derive(Debug)]
pub struct CoreState {
    /// Cumulative ticks attributed to the idle path.
    pub idle_accum: u64,
    /// Cumulative ticks attributed to real work.
    pub run_accum: u64,
    /// Clock reading at creation or the last reset. Queries measure against
    /// it but never advance it.
    pub idle_baseline: u64,
    /// Same, for the run accumulator.
    pub run_baseline: u64,
}

/// One record per possible core, alive for the whole process regardless of
/// the core's online state.
#[derive(Debug)]
pub struct CoreRecord {
    state: Mutex<CoreState>,
}

impl CoreRecord {
    fn new(baseline: u64) -> Self {
        Self {
            state: Mutex::new(CoreState {
                idle_accum: 0,
                run_accum: 0,
                idle_baseline: baseline,
                run_baseline: baseline,
            }),
        }
    }

    /// Acquire this record's lock.
    ///
    /// The critical section is O(1) counter arithmetic and cannot leave the
    /// state torn, so a poisoned lock is recovered rather than propagated.
    pub fn lock(&self) -> MutexGuard<'_, CoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fixed set of records, one per possible core, built once at startup.
///
/// A core going offline keeps its record untouched; coming back online
/// reuses it, so accounting resumes rather than restarts.
#[derive(Debug)]
pub struct CoreRegistry {
    records: Vec<CoreRecord>,
}

impl CoreRegistry {
    /// Create `cores` records, each baselined to the current reading of
    /// `clock` for its core.
    pub fn new(cores: usize, clock: &dyn ClockSource) -> Self {
        Self {
            records: (0..cores)
                .map(|core| CoreRecord::new(clock.now(core)))
                .collect(),
        }
    }

    /// The record for `core`.
    ///
    /// Panics when `core` is out of range: an invalid core id is a
    /// programming error, not a runtime-recoverable failure.
    pub fn record(&self, core: CoreId) -> &CoreRecord {
        &self.records[core]
    }

    /// Iterate every core id in the registry.
    pub fn cores(&self) -> std::ops::Range<CoreId> {
        0..self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
