//! Core lifecycle: hotplug events and exposure entry registration.
//!
//! Records are created once at startup and never destroyed; the only thing
//! that follows a core on- and offline is the visibility of its exposure
//! entries.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam::channel::Receiver;
use tracing::{debug, info, warn};

use crate::aggregate::Aggregator;
use crate::engine::AccountingEngine;
use crate::exposure::{format_times, Endpoint, EndpointRegistry, ExposureError};
use crate::CoreId;

/// A core availability transition delivered by the hotplug source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreEvent {
    Online(CoreId),
    Offline(CoreId),
}

/// Endpoint path for a core's data entry.
pub fn data_path(core: CoreId) -> String {
    format!("core{core}/data")
}

/// Endpoint path for a core's reset entry.
pub fn reset_path(core: CoreId) -> String {
    format!("core{core}/reset")
}

/// Aggregate entries, present when more than one core exists.
pub const ALL_DATA_PATH: &str = "all/data";
pub const ALL_RESET_PATH: &str = "all/reset";

/// Non-fatal endpoint registration failures collected during startup.
#[derive(Debug, Default)]
pub struct InitReport {
    pub failures: Vec<(String, ExposureError)>,
}

impl InitReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Reacts to core availability changes by adding and removing exposure
/// entries. Never touches record contents.
pub struct LifecycleManager {
    engine: Arc<AccountingEngine>,
    aggregator: Arc<Aggregator>,
    exposure: Arc<EndpointRegistry>,
    registered: Mutex<Vec<bool>>,
}

impl LifecycleManager {
    pub fn new(
        engine: Arc<AccountingEngine>,
        aggregator: Arc<Aggregator>,
        exposure: Arc<EndpointRegistry>,
    ) -> Self {
        let cores = engine.registry().len();
        Self {
            engine,
            aggregator,
            exposure,
            registered: Mutex::new(vec![false; cores]),
        }
    }

    /// Startup registration: core 0 unconditionally, plus the aggregate
    /// pair when more than one core exists.
    ///
    /// Registration failures are collected, not raised; an affected core
    /// keeps accumulating in memory, it is just unreachable externally.
    pub fn init(&self) -> InitReport {
        let mut report = InitReport::default();

        if let Err(err) = self.handle_online(0) {
            warn!(%err, "core0 exposure entries unavailable");
            report.failures.push((data_path(0), err));
        }

        if self.engine.registry().len() > 1 {
            self.register_aggregate_entries(&mut report);
        }

        report
    }

    /// Register `core<N>/data` and `core<N>/reset`. No-op for an already
    /// registered core.
    pub fn handle_online(&self, core: CoreId) -> Result<(), ExposureError> {
        let mut registered = self.lock_registered();
        let Some(slot) = registered.get_mut(core) else {
            warn!(core, "online event for core outside the registry ignored");
            return Ok(());
        };
        if *slot {
            debug!(core, "online event for registered core ignored");
            return Ok(());
        }

        self.register_core_entries(core)?;
        *slot = true;
        info!(core, "exposure entries registered");
        Ok(())
    }

    /// Remove `core<N>`'s entries; the record and its accumulated values
    /// stay untouched. No-op for an already unregistered core.
    pub fn handle_offline(&self, core: CoreId) {
        let mut registered = self.lock_registered();
        let Some(slot) = registered.get_mut(core) else {
            warn!(core, "offline event for core outside the registry ignored");
            return;
        };
        if !*slot {
            debug!(core, "offline event for unregistered core ignored");
            return;
        }

        // Both entries exist whenever the slot is marked registered.
        let _ = self.exposure.unregister(&data_path(core));
        let _ = self.exposure.unregister(&reset_path(core));
        *slot = false;
        info!(core, "exposure entries removed");
    }

    /// Dispatch one hotplug event.
    pub fn on_core_event(&self, event: CoreEvent) {
        match event {
            CoreEvent::Online(core) => {
                if let Err(err) = self.handle_online(core) {
                    warn!(core, %err, "exposure entry registration failed");
                }
            }
            CoreEvent::Offline(core) => self.handle_offline(core),
        }
    }

    /// Consume lifecycle events until the channel closes.
    ///
    /// Events are handled strictly in arrival order, which keeps a core's
    /// online/offline transitions ordered relative to entry visibility.
    pub fn run(&self, events: Receiver<CoreEvent>) {
        for event in events {
            self.on_core_event(event);
        }
        debug!("lifecycle event channel closed");
    }

    fn register_core_entries(&self, core: CoreId) -> Result<(), ExposureError> {
        let engine = Arc::clone(&self.engine);
        self.exposure.register(
            &data_path(core),
            Endpoint::Read(Arc::new(move || format_times(engine.query(core)))),
        )?;

        let engine = Arc::clone(&self.engine);
        let reset = Endpoint::Write(Arc::new(move |payload: &[u8]| {
            if payload.is_empty() {
                return 0;
            }
            engine.reset(core);
            payload.len()
        }));
        if let Err(err) = self.exposure.register(&reset_path(core), reset) {
            // Keep the pair consistent when the second registration fails.
            let _ = self.exposure.unregister(&data_path(core));
            return Err(err);
        }
        Ok(())
    }

    fn register_aggregate_entries(&self, report: &mut InitReport) {
        let aggregator = Arc::clone(&self.aggregator);
        if let Err(err) = self.exposure.register(
            ALL_DATA_PATH,
            Endpoint::Read(Arc::new(move || format_times(aggregator.query_all()))),
        ) {
            warn!(%err, "aggregate data entry unavailable");
            report.failures.push((ALL_DATA_PATH.to_string(), err));
        }

        let aggregator = Arc::clone(&self.aggregator);
        let reset = Endpoint::Write(Arc::new(move |payload: &[u8]| {
            if payload.is_empty() {
                return 0;
            }
            aggregator.reset_all();
            payload.len()
        }));
        if let Err(err) = self.exposure.register(ALL_RESET_PATH, reset) {
            warn!(%err, "aggregate reset entry unavailable");
            report.failures.push((ALL_RESET_PATH.to_string(), err));
        }
    }

    fn lock_registered(&self) -> MutexGuard<'_, Vec<bool>> {
        self.registered.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
