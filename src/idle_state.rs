//! Scheduler idle-state queries.
//!
//! The engine asks one question on every sample: is the work currently
//! scheduled on this core the idle path? `SharedIdleStates` is the
//! production answer, fed by a probe; `FixedIdleStates` gives canned
//! answers for tests.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::CoreId;

/// Reports whether the unit of work currently scheduled on a core is the
/// idle path.
///
/// Called inside the per-core critical section, so implementations must not
/// block.
pub trait IdleStateSource: Send + Sync {
    fn is_idle(&self, core: CoreId) -> bool;
}

/// Per-core idle flags shared between a probe and the accounting engine.
///
/// The engine side is a plain atomic load; a slow probe can never stall a
/// query.
#[derive(Debug)]
pub struct SharedIdleStates {
    flags: Vec<AtomicBool>,
}

impl SharedIdleStates {
    /// One flag per core, all initially busy.
    pub fn new(cores: usize) -> Self {
        Self {
            flags: (0..cores).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    /// Publish the latest classification for `core`.
    pub fn set(&self, core: CoreId, idle: bool) {
        self.flags[core].store(idle, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

impl IdleStateSource for SharedIdleStates {
    fn is_idle(&self, core: CoreId) -> bool {
        self.flags[core].load(Ordering::Relaxed)
    }
}

/// Constant answers, for tests and wiring smoke checks.
#[derive(Debug, Clone, Default)]
pub struct FixedIdleStates {
    default: bool,
    per_core: Vec<bool>,
}

impl FixedIdleStates {
    /// Every core answers `idle`.
    pub fn always(idle: bool) -> Self {
        Self {
            default: idle,
            per_core: Vec::new(),
        }
    }

    /// Explicit per-core answers; cores beyond the list answer `false`.
    pub fn from_flags(flags: Vec<bool>) -> Self {
        Self {
            default: false,
            per_core: flags,
        }
    }
}

impl IdleStateSource for FixedIdleStates {
    fn is_idle(&self, core: CoreId) -> bool {
        self.per_core.get(core).copied().unwrap_or(self.default)
    }
}
