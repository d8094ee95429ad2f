//! Property-based tests for the accounting invariants.

mod common;

use std::sync::Arc;

use common::build_service;
use ocioso::clock::ManualClock;
use ocioso::engine::CoreTimes;
use ocioso::idle_state::{FixedIdleStates, IdleStateSource, SharedIdleStates};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Both counters are non-decreasing across any query sequence without a
    // reset, whatever the idle-state flips and clock steps.
    #[test]
    fn prop_counters_monotonic_without_reset(
        steps in prop::collection::vec((0u64..1000, any::<bool>()), 1..50),
    ) {
        let clock = Arc::new(ManualClock::new());
        let idle = Arc::new(SharedIdleStates::new(1));
        let service = build_service(
            1,
            Arc::clone(&clock),
            Arc::clone(&idle) as Arc<dyn IdleStateSource>,
        );

        let mut last = CoreTimes::default();
        for (delta, is_idle) in steps {
            clock.advance(delta);
            idle.set(0, is_idle);
            let sample = service.engine().query(0);
            prop_assert!(sample.idle >= last.idle);
            prop_assert!(sample.run >= last.run);
            last = sample;
        }
    }

    // Replaying one clock/idle program against two twin services, the
    // aggregate total always equals the sum of per-core queries.
    #[test]
    fn prop_aggregate_equals_per_core_sum(
        cores in 1usize..6,
        flags in prop::collection::vec(any::<bool>(), 6),
        readings in prop::collection::vec(0u64..10_000, 1..20),
    ) {
        let flags = flags[..cores].to_vec();
        let clock_a = Arc::new(ManualClock::new());
        let twin_a = build_service(
            cores,
            Arc::clone(&clock_a),
            Arc::new(FixedIdleStates::from_flags(flags.clone())) as Arc<dyn IdleStateSource>,
        );
        let clock_b = Arc::new(ManualClock::new());
        let twin_b = build_service(
            cores,
            Arc::clone(&clock_b),
            Arc::new(FixedIdleStates::from_flags(flags)) as Arc<dyn IdleStateSource>,
        );

        let mut sorted = readings;
        sorted.sort_unstable();
        for t in sorted {
            clock_a.set(t);
            clock_b.set(t);

            let mut summed = CoreTimes::default();
            for core in 0..cores {
                summed.add(twin_a.engine().query(core));
            }
            prop_assert_eq!(twin_b.aggregator().query_all(), summed);
        }
    }

    // A reset followed by a frozen-clock query reads zero, no matter what
    // history preceded it.
    #[test]
    fn prop_reset_zeroes_any_history(
        history in prop::collection::vec((0u64..500, any::<bool>()), 0..30),
    ) {
        let clock = Arc::new(ManualClock::new());
        let idle = Arc::new(SharedIdleStates::new(1));
        let service = build_service(
            1,
            Arc::clone(&clock),
            Arc::clone(&idle) as Arc<dyn IdleStateSource>,
        );

        for (delta, is_idle) in history {
            clock.advance(delta);
            idle.set(0, is_idle);
            service.engine().query(0);
        }

        service.engine().reset(0);
        prop_assert_eq!(service.engine().query(0), CoreTimes::default());
    }

    // The reset endpoint accepts any non-empty payload and reports its
    // full length as consumed.
    #[test]
    fn prop_reset_write_consumes_full_payload(payload in prop::collection::vec(any::<u8>(), 1..512)) {
        let clock = Arc::new(ManualClock::new());
        let service = build_service(
            1,
            Arc::clone(&clock),
            Arc::new(FixedIdleStates::always(true)) as Arc<dyn IdleStateSource>,
        );

        clock.advance(100);
        service.exposure().read("core0/data").unwrap();

        let consumed = service.exposure().write("core0/reset", &payload).unwrap();
        prop_assert_eq!(consumed, payload.len());
        prop_assert_eq!(service.exposure().read("core0/data").unwrap(), "0 0\n");
    }
}
