use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ocioso::cli::{Cli, OutputFormat};
use ocioso::clock::{ClockSource, MonotonicClock};
use ocioso::config::{FileConfig, Settings};
use ocioso::idle_state::{IdleStateSource, SharedIdleStates};
use ocioso::lifecycle::{reset_path, CoreEvent, ALL_RESET_PATH};
use ocioso::output::Snapshot;
use ocioso::probe::{self, ProcStatSampler};
use ocioso::server;
use ocioso::service::AccountingService;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let file = match &args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let settings = Settings::resolve(&args, file);

    let cores = settings.cores.unwrap_or_else(probe::possible_cores);
    let idle_states = Arc::new(SharedIdleStates::new(cores));
    let (service, report) = AccountingService::new(
        cores,
        Arc::new(MonotonicClock::new()) as Arc<dyn ClockSource>,
        Arc::clone(&idle_states) as Arc<dyn IdleStateSource>,
    )?;
    for (path, err) in &report.failures {
        warn!(path = %path, %err, "endpoint unavailable");
    }

    // Initial online registration happens synchronously so the namespace is
    // complete before the first snapshot or reset write; later transitions
    // arrive through the sampler's event channel.
    match probe::present_cpus() {
        Ok(ids) => {
            for id in ids {
                service.lifecycle().on_core_event(CoreEvent::Online(id));
            }
        }
        Err(err) => warn!(%err, "present-core discovery failed, starting with core0 only"),
    }

    let (events_tx, events_rx) = crossbeam::channel::unbounded();
    let lifecycle_thread = service.spawn_lifecycle(events_rx);
    let sampler =
        ProcStatSampler::new(Arc::clone(&idle_states), events_tx, settings.interval).spawn();

    let server_handle = match settings.listen.as_deref() {
        Some(addr) => match server::serve(Arc::clone(service.exposure()), addr) {
            Ok(handle) => {
                info!(addr = %handle.local_addr(), "exposure server listening");
                Some(handle)
            }
            Err(err) => {
                error!(addr, %err, "exposure transport unavailable; accounting continues unexposed");
                None
            }
        },
        None => None,
    };

    if let Some(scope) = &args.reset {
        let path = if scope.is_empty() {
            if service.cores() > 1 {
                ALL_RESET_PATH.to_string()
            } else {
                reset_path(0)
            }
        } else {
            scope.clone()
        };
        service
            .exposure()
            .write(&path, b"1")
            .with_context(|| format!("reset write to {path} failed"))?;
        info!(path = %path, "counters reset");
    }

    loop {
        let snapshot = Snapshot::collect(service.engine());
        match settings.format {
            OutputFormat::Text => print!("{}", snapshot.render_text()),
            OutputFormat::Json => println!("{}", snapshot.render_json()?),
        }
        if args.once {
            break;
        }
        std::thread::sleep(settings.interval);
    }

    sampler.stop();
    let _ = lifecycle_thread.join();
    if let Some(handle) = server_handle {
        handle.stop();
    }
    Ok(())
}
