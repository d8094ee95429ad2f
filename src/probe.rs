//! Host-side collaborators: core discovery and the /proc/stat probe.
//!
//! The engine only consumes the `ClockSource` and `IdleStateSource` traits;
//! this module supplies the host-backed halves: which cores exist, which of
//! them currently look idle, and when they come and go.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::Sender;
use thiserror::Error;
use tracing::{debug, warn};

use crate::idle_state::SharedIdleStates;
use crate::lifecycle::CoreEvent;
use crate::CoreId;

const PRESENT_PATH: &str = "/sys/devices/system/cpu/present";
const STAT_PATH: &str = "/proc/stat";

/// Errors from reading and parsing the host's cpu files.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: &'static str,
        source: std::io::Error,
    },

    #[error("could not parse {path}: {reason}")]
    Parse {
        path: &'static str,
        reason: String,
    },
}

/// Logical CPU ids currently present, from the kernel's present mask
/// (`0-3,5` range syntax).
pub fn present_cpus() -> Result<Vec<CoreId>, ProbeError> {
    let raw = std::fs::read_to_string(PRESENT_PATH).map_err(|source| ProbeError::Read {
        path: PRESENT_PATH,
        source,
    })?;
    parse_cpu_list(raw.trim())
}

/// Parse a kernel cpu list: comma-separated ids and inclusive ranges.
pub fn parse_cpu_list(raw: &str) -> Result<Vec<CoreId>, ProbeError> {
    let parse_err = |reason: String| ProbeError::Parse {
        path: PRESENT_PATH,
        reason,
    };

    let mut ids = Vec::new();
    for range in raw.split(',') {
        let mut parts = range.split('-');

        let first: Option<CoreId> = parts
            .next()
            .filter(|text| !text.is_empty())
            .map(str::parse)
            .transpose()
            .map_err(|_| parse_err(format!("bad id in {range:?}")))?;
        let second: Option<CoreId> = parts
            .next()
            .map(str::parse)
            .transpose()
            .map_err(|_| parse_err(format!("bad id in {range:?}")))?;

        if parts.next().is_some() {
            return Err(parse_err(format!("malformed range {range:?}")));
        }

        match (first, second) {
            (Some(value), None) => ids.push(value),
            (Some(start), Some(stop)) if start <= stop => ids.extend(start..=stop),
            (Some(start), Some(stop)) => {
                return Err(parse_err(format!("descending range {start}-{stop}")))
            }
            _ => continue,
        }
    }
    Ok(ids)
}

/// Possible-core count for registry sizing: the present mask when readable,
/// else `sysconf(_SC_NPROCESSORS_CONF)`, else 1.
pub fn possible_cores() -> usize {
    match present_cpus() {
        Ok(ids) => ids.iter().max().map(|max| max + 1).unwrap_or(1),
        Err(err) => {
            warn!(%err, "falling back to sysconf for the core count");
            // SAFETY: sysconf takes no pointers and has no preconditions.
            let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_CONF) };
            if n > 0 {
                n as usize
            } else {
                1
            }
        }
    }
}

/// Counters for one `cpu<N>` line of /proc/stat, reduced to the split the
/// probe cares about. Values are cumulative jiffies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuLine {
    pub id: CoreId,
    /// user + nice + system + irq + softirq + steal.
    pub busy: u64,
    /// idle + iowait.
    pub idle: u64,
}

/// Per-cpu lines from one /proc/stat read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcStatSnapshot {
    pub cpus: Vec<CpuLine>,
}

impl ProcStatSnapshot {
    pub fn read() -> Result<Self, ProbeError> {
        let content = std::fs::read_to_string(STAT_PATH).map_err(|source| ProbeError::Read {
            path: STAT_PATH,
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse /proc/stat text, keeping only the numbered `cpu<N>` lines.
    ///
    /// Fields: user nice system idle iowait irq softirq steal; trailing
    /// guest fields are ignored (guest time is already in user/nice).
    pub fn parse(content: &str) -> Result<Self, ProbeError> {
        let mut cpus = Vec::new();

        for line in content.lines() {
            let Some(rest) = line.strip_prefix("cpu") else {
                continue;
            };
            // The aggregate "cpu " line has no number after the prefix.
            if !rest.starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            let mut fields = rest.split_whitespace();
            let Some(id) = fields.next().and_then(|text| text.parse::<CoreId>().ok()) else {
                continue;
            };

            let mut values = [0u64; 8];
            for value in values.iter_mut() {
                *value = match fields.next() {
                    Some(text) => text.parse().map_err(|_| ProbeError::Parse {
                        path: STAT_PATH,
                        reason: format!("bad counter on cpu{id}"),
                    })?,
                    // Old kernels report fewer fields; missing ones are 0.
                    None => 0,
                };
            }

            let [user, nice, system, idle, iowait, irq, softirq, steal] = values;
            // Saturate: counters this large only show up in corrupt input.
            let busy = [nice, system, irq, softirq, steal]
                .iter()
                .fold(user, |sum, v| sum.saturating_add(*v));
            cpus.push(CpuLine {
                id,
                busy,
                idle: idle.saturating_add(iowait),
            });
        }

        if cpus.is_empty() {
            return Err(ProbeError::Parse {
                path: STAT_PATH,
                reason: "no per-cpu lines".to_string(),
            });
        }
        Ok(Self { cpus })
    }

    fn line(&self, id: CoreId) -> Option<&CpuLine> {
        self.cpus.iter().find(|cpu| cpu.id == id)
    }
}

/// Periodic /proc/stat probe.
///
/// Each tick classifies a core as idle when the idle share of the delta
/// since the previous sample dominates, publishes the flag, and emits
/// `Online`/`Offline` events when per-cpu lines appear or vanish between
/// samples (offline CPUs drop out of /proc/stat).
pub struct ProcStatSampler {
    idle_states: Arc<SharedIdleStates>,
    events: Sender<CoreEvent>,
    interval: Duration,
    previous: Option<ProcStatSnapshot>,
    online: Vec<bool>,
}

/// Running sampler thread. `stop` requests shutdown and joins.
pub struct SamplerHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl SamplerHandle {
    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        let _ = self.thread.join();
    }
}

impl ProcStatSampler {
    pub fn new(
        idle_states: Arc<SharedIdleStates>,
        events: Sender<CoreEvent>,
        interval: Duration,
    ) -> Self {
        let cores = idle_states.len();
        Self {
            idle_states,
            events,
            interval,
            previous: None,
            online: vec![false; cores],
        }
    }

    /// Run the probe on a dedicated thread until the handle is stopped.
    pub fn spawn(mut self) -> SamplerHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                match ProcStatSnapshot::read() {
                    Ok(snapshot) => self.apply(snapshot),
                    Err(err) => warn!(%err, "probe tick skipped"),
                }
                thread::sleep(self.interval);
            }
        });
        SamplerHandle { stop, thread }
    }

    /// Fold one snapshot into the shared flags and the hotplug channel.
    pub(crate) fn apply(&mut self, snapshot: ProcStatSnapshot) {
        let mut seen = vec![false; self.online.len()];

        for cpu in &snapshot.cpus {
            if cpu.id >= self.online.len() {
                debug!(core = cpu.id, "cpu line beyond the registry ignored");
                continue;
            }
            seen[cpu.id] = true;

            if !self.online[cpu.id] {
                self.online[cpu.id] = true;
                let _ = self.events.send(CoreEvent::Online(cpu.id));
            }

            if let Some(prev) = self.previous.as_ref().and_then(|p| p.line(cpu.id)) {
                let idle_delta = cpu.idle.saturating_sub(prev.idle);
                let busy_delta = cpu.busy.saturating_sub(prev.busy);
                self.idle_states.set(cpu.id, idle_delta >= busy_delta);
            }
        }

        for (core, online) in self.online.iter_mut().enumerate() {
            if *online && !seen[core] {
                *online = false;
                let _ = self.events.send(CoreEvent::Offline(core));
            }
        }

        self.previous = Some(snapshot);
    }
}
