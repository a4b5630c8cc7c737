// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

/// Benchmark address learning and whole-switch forwarding.
use std::hint::black_box;
use std::rc::Rc;

use beat_engine::engine::Engine;
use beat_switch::address_table::{TableKind, build_table};
use beat_switch::config::SwitchConfig;
use beat_switch::frame::MacAddr;
use beat_switch::switch::Switch;
use beat_switch::traffic::{FrameGen, TrafficPattern};
use beat_track::tracker::dev_null_tracker;
use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};

const NUM_PORTS: usize = 8;
const FRAMES_PER_PORT: usize = 200;

fn create_engine() -> Engine {
    // Create an engine without the tracker system opening files for logging
    let tracker = dev_null_tracker();
    Engine::new(&tracker)
}

fn learn_and_lookup(kind: TableKind, capacity: usize) -> usize {
    let mut table = build_table(kind, capacity).unwrap();
    let stations = 2 * capacity as u64;
    for i in 0..stations {
        table.learn(MacAddr::from_u64(0x0200_0000_0000 | i), (i % 8) as usize);
    }
    (0..stations)
        .filter_map(|i| table.lookup(&MacAddr::from_u64(0x0200_0000_0000 | i)))
        .count()
}

fn spawn_loaded_switch(pattern: TrafficPattern) -> (Engine, Rc<Switch>) {
    let engine = create_engine();
    let top = engine.top().clone();
    let config = SwitchConfig::with_ports(NUM_PORTS);
    let switch = Switch::new_and_register(&engine, &top, "switch", config).unwrap();
    for source in 0..NUM_PORTS {
        let frames = FrameGen::new(
            &top,
            source,
            NUM_PORTS,
            (source + 1) % NUM_PORTS,
            pattern,
            (64, 1518),
            FRAMES_PER_PORT,
            0xBE4C,
        );
        for frame in frames {
            switch.inject(source, frame).unwrap();
        }
    }
    (engine, switch)
}

fn run_switch((engine, _switch): (Engine, Rc<Switch>)) {
    engine.run().unwrap();
}

fn bench_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("table");
    for capacity in [64, 1024] {
        for kind in [TableKind::Indexed, TableKind::Linear] {
            group.bench_with_input(
                BenchmarkId::new(kind.to_string(), capacity),
                &capacity,
                |b, capacity| b.iter(|| black_box(learn_and_lookup(kind, *capacity))),
            );
        }
    }
    group.finish();
}

fn bench_switch(c: &mut Criterion) {
    let mut group = c.benchmark_group("switch");
    group.sample_size(10);

    for pattern in [TrafficPattern::Random, TrafficPattern::AllToOne] {
        group.bench_function(pattern.to_string(), |b| {
            b.iter_batched(
                || spawn_loaded_switch(pattern),
                run_switch,
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default();
    targets = bench_table, bench_switch
}
criterion_main!(benches);
