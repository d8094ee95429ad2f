//! Aggregation across every core in the registry.

use std::sync::Arc;

use crate::engine::{AccountingEngine, CoreTimes};

/// Sums per-core query results and fans out resets.
pub struct Aggregator {
    engine: Arc<AccountingEngine>,
}

impl Aggregator {
    pub fn new(engine: Arc<AccountingEngine>) -> Self {
        Self { engine }
    }

    /// Sum of `query` over every core.
    ///
    /// Each core is sampled under its own lock at a slightly different
    /// instant; the total is not a cross-core atomic snapshot. The record
    /// set is fixed at startup, so the walk itself cannot race a core
    /// arriving or leaving.
    pub fn query_all(&self) -> CoreTimes {
        let mut total = CoreTimes::default();
        for core in self.engine.registry().cores() {
            total.add(self.engine.query(core));
        }
        total
    }

    /// Reset every core, one lock at a time.
    pub fn reset_all(&self) {
        for core in self.engine.registry().cores() {
            self.engine.reset(core);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ClockSource, ManualClock};
    use crate::idle_state::{FixedIdleStates, IdleStateSource};
    use crate::registry::CoreRegistry;

    fn aggregator_with(
        cores: usize,
        clock: Arc<ManualClock>,
        idle: FixedIdleStates,
    ) -> (Arc<AccountingEngine>, Aggregator) {
        let registry = Arc::new(CoreRegistry::new(cores, clock.as_ref()));
        let engine = Arc::new(AccountingEngine::new(
            registry,
            clock as Arc<dyn ClockSource>,
            Arc::new(idle) as Arc<dyn IdleStateSource>,
        ));
        (Arc::clone(&engine), Aggregator::new(engine))
    }

    #[test]
    fn test_query_all_sums_cores() {
        let clock = Arc::new(ManualClock::new());
        let (_, aggregator) = aggregator_with(
            3,
            Arc::clone(&clock),
            FixedIdleStates::from_flags(vec![true, false, true]),
        );

        clock.set(10);
        let total = aggregator.query_all();
        assert_eq!(total, CoreTimes { idle: 20, run: 10 });
    }

    #[test]
    fn test_reset_all_zeroes_every_core() {
        let clock = Arc::new(ManualClock::new());
        let (engine, aggregator) =
            aggregator_with(4, Arc::clone(&clock), FixedIdleStates::always(true));

        clock.set(100);
        aggregator.query_all();
        aggregator.reset_all();

        // Frozen clock after the reset: every core reads back zero.
        for core in 0..4 {
            assert_eq!(engine.query(core), CoreTimes::default());
        }
        assert_eq!(aggregator.query_all(), CoreTimes::default());
    }

    #[test]
    fn test_single_core_aggregate_matches_query() {
        let clock = Arc::new(ManualClock::new());
        let (engine, aggregator) =
            aggregator_with(1, Arc::clone(&clock), FixedIdleStates::always(false));

        clock.set(9);
        assert_eq!(aggregator.query_all(), CoreTimes { idle: 0, run: 9 });
        // The aggregate query above also advanced the accumulation, as any
        // query does.
        assert_eq!(engine.query(0), CoreTimes { idle: 0, run: 18 });
    }
}
