// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

mod common;

use std::thread;
use std::time::Duration;

use flume_engine::test_helpers::start_test;
use flume_engine::types::SimOutcome;

#[test]
fn subsystem_timestep_snaps_to_a_divisor() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("outer");
    system.set_desired_timestep(0.01);

    let mut inner = engine.create_system("inner");
    inner.set_desired_timestep(0.003);
    inner.add_component(common::StepCounter::creator()).unwrap();
    inner
        .add_component(engine.create_component("SignalSink").unwrap())
        .unwrap();
    inner.connect("StepCounter", "out", "SignalSink", "in").unwrap();
    inner.set_type_cqs(flume_engine::types::CqsType::S);
    system.add_component(Box::new(inner)).unwrap();

    system.initialize(0.0, 0.02).unwrap();

    // 0.01 / round(0.01 / 0.003) = 0.01 / 3
    let inner_ts = system
        .sub_system_mut("inner")
        .unwrap()
        .timestep();
    assert!((inner_ts - 0.01 / 3.0).abs() < 1e-12);

    assert_eq!(system.simulate(0.02), SimOutcome::Finished);

    // Two outer steps, three sub-steps each
    let steps = system
        .last_value("inner.StepCounter.out", "Value")
        .unwrap();
    assert_eq!(steps, 6.0);

    // The effective step divides the parent step to within float noise
    let ratio = 0.01 / inner_ts;
    assert!((ratio - ratio.round()).abs() < 1e-9);
}

#[test]
fn component_inheriting_timestep_gets_the_system_step() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("model");
    system.set_desired_timestep(0.005);
    system.add_component(common::StepCounter::creator()).unwrap();
    system
        .add_component(engine.create_component("SignalSink").unwrap())
        .unwrap();
    system.connect("StepCounter", "out", "SignalSink", "in").unwrap();
    system.initialize(0.0, 0.1).unwrap();
    system.simulate(0.1);
    assert_eq!(
        system.last_value("StepCounter.out", "Value").unwrap(),
        20.0
    );
}

#[test]
fn cancel_mid_simulation_finalizes_exactly_once() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("model");
    system.add_component(common::FinalizeProbe::creator()).unwrap();
    system
        .add_component(engine.create_component("SignalSink").unwrap())
        .unwrap();
    system
        .connect("FinalizeProbe", "out", "SignalSink", "in")
        .unwrap();
    system.set_desired_timestep(0.001);

    // A very long run, stopped from another thread shortly after start
    system.initialize(0.0, 1.0e6).unwrap();
    let stop = system.stop_handle();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        stop.store(true, std::sync::atomic::Ordering::Relaxed);
    });
    let outcome = system.simulate(1.0e6);
    stopper.join().unwrap();

    assert_eq!(outcome, SimOutcome::Canceled);
    assert_eq!(
        system.last_value("FinalizeProbe.out", "Value").unwrap(),
        1.0
    );

    // A second finalize must not run the hooks again
    system.finalize();
    assert_eq!(
        system.last_value("FinalizeProbe.out", "Value").unwrap(),
        1.0
    );

    let mut canceled_infos = 0;
    while let Some(msg) = engine.pop_message() {
        if msg.severity == log::Level::Info && msg.text.contains("canceled") {
            canceled_infos += 1;
        }
    }
    assert_eq!(canceled_infos, 1);
}

#[test]
fn zero_length_simulation_logs_a_single_sample() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("model");
    system
        .add_component(engine.create_component("SignalSource").unwrap())
        .unwrap();
    system
        .add_component(engine.create_component("SignalSink").unwrap())
        .unwrap();
    system
        .connect("SignalSource", "out", "SignalSink", "in")
        .unwrap();
    system.set_parameter_value("SignalSource", "y", "4.0").unwrap();
    system.set_desired_timestep(0.01);

    system.initialize(0.0, 0.0).unwrap();
    assert_eq!(system.simulate(0.0), SimOutcome::Finished);

    let node = system.port_of("SignalSink", "in").unwrap().node().unwrap().clone();
    assert_eq!(node.log_ctr(), 1);
    assert_eq!(system.log_data("SignalSink.in", "Value").unwrap()[0], 4.0);
}

#[test]
fn multi_threaded_matches_single_threaded() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    // Three independent source/sink pairs: a logged node's value depends
    // only on its own source, so the result must be identical whatever the
    // in-phase interleaving
    let build = |name: &str| {
        let mut system = engine.create_system(name);
        for (i, t_step) in [0.01, 0.02, 0.03].iter().enumerate() {
            let source = system
                .add_component(engine.create_component("SignalStep").unwrap())
                .unwrap();
            let sink = system
                .add_component(engine.create_component("SignalSink").unwrap())
                .unwrap();
            system
                .set_parameter_value(&source, "t_step", &t_step.to_string())
                .unwrap();
            system
                .set_parameter_value(&source, "amplitude", &(i as f64 + 1.0).to_string())
                .unwrap();
            system.connect(&source, "out", &sink, "in").unwrap();
        }
        system.set_desired_timestep(0.001);
        system
    };

    let mut single = build("single");
    single.initialize_with_samples(0.0, 0.05, 51).unwrap();
    assert_eq!(single.simulate(0.05), SimOutcome::Finished);

    let mut threaded = build("threaded");
    threaded.initialize_with_samples(0.0, 0.05, 51).unwrap();
    threaded.simulate_and_measure_time(4).unwrap();
    // Reset after the measurement warm-up
    threaded.initialize_with_samples(0.0, 0.05, 51).unwrap();
    assert_eq!(
        threaded.simulate_multi_threaded(0.05, 3),
        SimOutcome::Finished
    );

    for sink in ["SignalSink.in", "SignalSink_1.in", "SignalSink_2.in"] {
        let expected = single.log_data(sink, "Value").unwrap();
        let actual = threaded.log_data(sink, "Value").unwrap();
        assert_eq!(expected, actual, "{sink} diverged");
    }
}

#[test]
fn simulate_refuses_to_run_uninitialized() {
    let engine = start_test(file!());
    let mut system = engine.create_system("model");
    system.add_component(common::StepCounter::creator()).unwrap();
    assert_eq!(system.simulate(1.0), SimOutcome::NotReady);
    assert_eq!(system.simulate_multi_threaded(1.0, 2), SimOutcome::NotReady);
}
