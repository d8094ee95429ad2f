//! Service construction and wiring.
//!
//! One `AccountingService` owns the whole accounting state for a process:
//! the registry, the engine and aggregator over it, the exposure table, and
//! the lifecycle manager that keeps the table in sync with core
//! availability.

use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Result;
use crossbeam::channel::Receiver;

use crate::aggregate::Aggregator;
use crate::clock::ClockSource;
use crate::engine::AccountingEngine;
use crate::exposure::EndpointRegistry;
use crate::idle_state::IdleStateSource;
use crate::lifecycle::{CoreEvent, InitReport, LifecycleManager};
use crate::registry::CoreRegistry;

/// The assembled accounting service.
pub struct AccountingService {
    registry: Arc<CoreRegistry>,
    engine: Arc<AccountingEngine>,
    aggregator: Arc<Aggregator>,
    exposure: Arc<EndpointRegistry>,
    lifecycle: Arc<LifecycleManager>,
}

impl AccountingService {
    /// Build records for `cores` possible cores baselined to `clock`, wire
    /// the components, and run startup registration (core 0, plus the
    /// aggregate entries when more than one core exists).
    ///
    /// The report carries non-fatal registration failures; construction
    /// itself only fails on an impossible topology.
    pub fn new(
        cores: usize,
        clock: Arc<dyn ClockSource>,
        idle_states: Arc<dyn IdleStateSource>,
    ) -> Result<(Self, InitReport)> {
        anyhow::ensure!(cores > 0, "core count must be at least 1");

        let registry = Arc::new(CoreRegistry::new(cores, clock.as_ref()));
        let engine = Arc::new(AccountingEngine::new(
            Arc::clone(&registry),
            clock,
            idle_states,
        ));
        let aggregator = Arc::new(Aggregator::new(Arc::clone(&engine)));
        let exposure = Arc::new(EndpointRegistry::new());
        let lifecycle = Arc::new(LifecycleManager::new(
            Arc::clone(&engine),
            Arc::clone(&aggregator),
            Arc::clone(&exposure),
        ));

        let report = lifecycle.init();

        Ok((
            Self {
                registry,
                engine,
                aggregator,
                exposure,
                lifecycle,
            },
            report,
        ))
    }

    /// Spawn the lifecycle consumer thread; it exits when every sender of
    /// `events` is dropped.
    pub fn spawn_lifecycle(&self, events: Receiver<CoreEvent>) -> JoinHandle<()> {
        let lifecycle = Arc::clone(&self.lifecycle);
        std::thread::spawn(move || lifecycle.run(events))
    }

    pub fn cores(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &Arc<CoreRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<AccountingEngine> {
        &self.engine
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    pub fn exposure(&self) -> &Arc<EndpointRegistry> {
        &self.exposure
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::idle_state::FixedIdleStates;

    fn service(cores: usize) -> (AccountingService, InitReport) {
        AccountingService::new(
            cores,
            Arc::new(ManualClock::new()),
            Arc::new(FixedIdleStates::always(true)),
        )
        .unwrap()
    }

    #[test]
    fn test_zero_cores_rejected() {
        let result = AccountingService::new(
            0,
            Arc::new(ManualClock::new()),
            Arc::new(FixedIdleStates::always(true)),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_new_registers_startup_entries() {
        let (service, report) = service(2);
        assert!(report.is_clean());
        assert_eq!(service.cores(), 2);
        assert!(service.exposure().contains("core0/data"));
        assert!(service.exposure().contains("all/data"));
        // Core 1 appears only after its online event.
        assert!(!service.exposure().contains("core1/data"));
    }

    #[test]
    fn test_lifecycle_thread_drains_channel() {
        let (service, _) = service(3);
        let (tx, rx) = crossbeam::channel::unbounded();
        let handle = service.spawn_lifecycle(rx);

        tx.send(CoreEvent::Online(1)).unwrap();
        tx.send(CoreEvent::Online(2)).unwrap();
        drop(tx);
        handle.join().unwrap();

        assert!(service.exposure().contains("core1/data"));
        assert!(service.exposure().contains("core2/reset"));
    }
}
