//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ocioso::clock::{ClockSource, ManualClock};
use ocioso::idle_state::IdleStateSource;
use ocioso::service::AccountingService;
use ocioso::CoreId;

/// Service over a manual clock and the given idle source; startup
/// registration must succeed.
pub fn build_service(
    cores: usize,
    clock: Arc<ManualClock>,
    idle: Arc<dyn IdleStateSource>,
) -> AccountingService {
    let (service, report) =
        AccountingService::new(cores, clock as Arc<dyn ClockSource>, idle).unwrap();
    assert!(report.is_clean());
    service
}

/// Idle source that stalls inside the collaborator call for one chosen
/// core, to make lock-holding windows observable.
pub struct DelayIdle {
    pub slow_core: CoreId,
    pub delay: Duration,
    pub idle: bool,
}

impl IdleStateSource for DelayIdle {
    fn is_idle(&self, core: CoreId) -> bool {
        if core == self.slow_core {
            std::thread::sleep(self.delay);
        }
        self.idle
    }
}

/// Clock wrapper with the same delay injection on the clock side.
pub struct DelayClock {
    pub inner: Arc<ManualClock>,
    pub slow_core: CoreId,
    pub delay: Duration,
}

impl ClockSource for DelayClock {
    fn now(&self, core: CoreId) -> u64 {
        if core == self.slow_core {
            std::thread::sleep(self.delay);
        }
        self.inner.now(core)
    }
}
