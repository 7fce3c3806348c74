// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! Throughput benchmarks for the standard components.

use criterion::{Criterion, criterion_group, criterion_main};
use flume_engine::engine::Engine;
use flume_engine::system::System;
use flume_engine::types::SimOutcome;
use flume_track::tracker::dev_null_tracker;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A chain of gains with randomised factors between a source and a sink.
fn build_signal_chain(engine: &Engine, num_gains: usize) -> System {
    let mut rng = StdRng::seed_from_u64(7);
    let mut system = engine.create_system("bench");
    system
        .add_component(engine.create_component("SignalSource").unwrap())
        .unwrap();
    let mut previous = "SignalSource".to_owned();
    for _ in 0..num_gains {
        let gain = system
            .add_component(engine.create_component("SignalGain").unwrap())
            .unwrap();
        let k: f64 = rng.gen_range(0.5..1.5);
        system
            .set_parameter_value(&gain, "k", &k.to_string())
            .unwrap();
        system.connect(&previous, "out", &gain, "in").unwrap();
        previous = gain;
    }
    let sink = system
        .add_component(engine.create_component("SignalSink").unwrap())
        .unwrap();
    system.connect(&previous, "out", &sink, "in").unwrap();
    system.set_desired_timestep(1.0e-4);
    system
}

fn build_hydraulic_circuit(engine: &Engine) -> System {
    let mut system = engine.create_system("bench");
    for key in [
        "HydraulicPressureSourceC",
        "HydraulicLaminarOrifice",
        "HydraulicVolume",
        "HydraulicTank",
    ] {
        system
            .add_component(engine.create_component(key).unwrap())
            .unwrap();
    }
    system
        .connect(
            "HydraulicPressureSourceC",
            "p1",
            "HydraulicLaminarOrifice",
            "p1",
        )
        .unwrap();
    system
        .connect("HydraulicLaminarOrifice", "p2", "HydraulicVolume", "p1")
        .unwrap();
    system
        .connect("HydraulicVolume", "p2", "HydraulicTank", "p1")
        .unwrap();
    system.set_desired_timestep(1.0e-4);
    system
}

fn bench_components(c: &mut Criterion) {
    let engine = Engine::new(&dev_null_tracker());
    flume_components::register(engine.component_factory()).unwrap();

    c.bench_function("signal_chain_32_gains_1k_steps", |b| {
        let mut system = build_signal_chain(&engine, 32);
        b.iter(|| {
            system.initialize(0.0, 0.1).unwrap();
            assert_eq!(system.simulate(0.1), SimOutcome::Finished);
        });
    });

    c.bench_function("hydraulic_circuit_1k_steps", |b| {
        let mut system = build_hydraulic_circuit(&engine);
        b.iter(|| {
            system.initialize(0.0, 0.1).unwrap();
            assert_eq!(system.simulate(0.1), SimOutcome::Finished);
        });
    });
}

criterion_group!(benches, bench_components);
criterion_main!(benches);
