//! The accounting algorithm: query and reset over one core's record.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::clock::ClockSource;
use crate::idle_state::IdleStateSource;
use crate::registry::CoreRegistry;
use crate::CoreId;

/// Cumulative idle/run ticks returned by a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoreTimes {
    pub idle: u64,
    pub run: u64,
}

impl CoreTimes {
    /// Fold another sample into a running total.
    pub fn add(&mut self, other: CoreTimes) {
        self.idle += other.idle;
        self.run += other.run;
    }
}

/// Query/reset operations over the per-core records.
///
/// Holds the registry together with the two collaborators it consults
/// inside the critical section. Both collaborator calls must be
/// non-blocking; the shipped implementations are a raw `clock_gettime` and
/// an atomic load.
pub struct AccountingEngine {
    registry: Arc<CoreRegistry>,
    clock: Arc<dyn ClockSource>,
    idle_states: Arc<dyn IdleStateSource>,
}

impl AccountingEngine {
    pub fn new(
        registry: Arc<CoreRegistry>,
        clock: Arc<dyn ClockSource>,
        idle_states: Arc<dyn IdleStateSource>,
    ) -> Self {
        Self {
            registry,
            clock,
            idle_states,
        }
    }

    /// Sample `core`'s counters.
    ///
    /// This is a read with a side effect: the ticks elapsed since the
    /// matching baseline are folded into whichever accumulator corresponds
    /// to the core's current state, and the baseline stays where the last
    /// reset put it. Two back-to-back queries during one continuous idle
    /// stretch therefore each add `now - baseline`, not `now - previous
    /// now`. Baselines move only on reset; see DESIGN.md before changing
    /// that.
    ///
    /// Panics when `core` is out of range.
    pub fn query(&self, core: CoreId) -> CoreTimes {
        let record = self.registry.record(core);
        let mut state = record.lock();

        let now = self.clock.now(core);
        if self.idle_states.is_idle(core) {
            state.idle_accum += now - state.idle_baseline;
        } else {
            state.run_accum += now - state.run_baseline;
        }

        CoreTimes {
            idle: state.idle_accum,
            run: state.run_accum,
        }
    }

    /// Zero `core`'s accumulators and re-baseline both timestamps to the
    /// current clock reading.
    ///
    /// Panics when `core` is out of range.
    pub fn reset(&self, core: CoreId) {
        let record = self.registry.record(core);
        let mut state = record.lock();

        state.idle_accum = 0;
        state.run_accum = 0;
        let now = self.clock.now(core);
        state.idle_baseline = now;
        state.run_baseline = now;

        debug!(core, baseline = now, "counters reset");
    }

    pub fn registry(&self) -> &Arc<CoreRegistry> {
        &self.registry
    }
}
