//! Query hot-path benchmarks.
//!
//! A query is one mutex acquisition, two collaborator calls, and O(1)
//! arithmetic; it runs on every external read, so it has to stay cheap.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;

use ocioso::aggregate::Aggregator;
use ocioso::clock::{ClockSource, MonotonicClock};
use ocioso::engine::AccountingEngine;
use ocioso::idle_state::{FixedIdleStates, IdleStateSource};
use ocioso::registry::CoreRegistry;

const CORES: usize = 8;

fn build_engine() -> Arc<AccountingEngine> {
    let clock = Arc::new(MonotonicClock::new());
    let registry = Arc::new(CoreRegistry::new(CORES, clock.as_ref()));
    Arc::new(AccountingEngine::new(
        registry,
        clock as Arc<dyn ClockSource>,
        Arc::new(FixedIdleStates::always(false)) as Arc<dyn IdleStateSource>,
    ))
}

fn bench_query(c: &mut Criterion) {
    let engine = build_engine();

    let mut group = c.benchmark_group("query");
    group.throughput(Throughput::Elements(1));
    group.bench_function("single_core", |b| {
        b.iter(|| black_box(engine.query(black_box(0))))
    });
    group.finish();
}

fn bench_query_all(c: &mut Criterion) {
    let engine = build_engine();
    let aggregator = Aggregator::new(Arc::clone(&engine));

    let mut group = c.benchmark_group("query_all");
    group.throughput(Throughput::Elements(CORES as u64));
    group.bench_function("eight_cores", |b| {
        b.iter(|| black_box(aggregator.query_all()))
    });
    group.finish();
}

fn bench_reset(c: &mut Criterion) {
    let engine = build_engine();

    c.bench_function("reset_single_core", |b| {
        b.iter(|| engine.reset(black_box(0)))
    });
}

criterion_group!(benches, bench_query, bench_query_all, bench_reset);
criterion_main!(benches);
