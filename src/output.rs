//! Snapshot rendering for the CLI.

use serde::Serialize;

use crate::engine::{AccountingEngine, CoreTimes};
use crate::CoreId;

/// One sampled core.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CoreSample {
    pub core: CoreId,
    pub idle: u64,
    pub run: u64,
}

/// Per-core samples plus their sum, taken in a single pass.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub cores: Vec<CoreSample>,
    pub total: CoreTimes,
}

impl Snapshot {
    /// Query every core once and total the same pass, so the aggregate row
    /// matches the per-core rows instead of re-querying (queries have side
    /// effects).
    pub fn collect(engine: &AccountingEngine) -> Self {
        let mut cores = Vec::with_capacity(engine.registry().len());
        let mut total = CoreTimes::default();

        for core in engine.registry().cores() {
            let times = engine.query(core);
            total.add(times);
            cores.push(CoreSample {
                core,
                idle: times.idle,
                run: times.run,
            });
        }

        Self { cores, total }
    }

    /// Plain-text table, one row per core and a total row.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{:<8} {:>20} {:>20}\n", "core", "idle", "run"));
        for sample in &self.cores {
            out.push_str(&format!(
                "core{:<4} {:>20} {:>20}\n",
                sample.core, sample.idle, sample.run
            ));
        }
        out.push_str(&format!(
            "{:<8} {:>20} {:>20}\n",
            "total", self.total.idle, self.total.run
        ));
        out
    }

    /// JSON document for machine parsing.
    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
