// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

use flume_engine::test_helpers::start_test;
use flume_engine::types::SimOutcome;

#[test]
fn step_source_switches_at_step_time() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("model");
    system
        .add_component(engine.create_component("SignalStep").unwrap())
        .unwrap();
    system
        .add_component(engine.create_component("SignalSink").unwrap())
        .unwrap();
    system.set_parameter_value("SignalStep", "y0", "1.0").unwrap();
    system
        .set_parameter_value("SignalStep", "amplitude", "2.0")
        .unwrap();
    system.set_parameter_value("SignalStep", "t_step", "0.05").unwrap();
    system.connect("SignalStep", "out", "SignalSink", "in").unwrap();

    system.set_desired_timestep(0.01);
    system.initialize_with_samples(0.0, 0.1, 11).unwrap();
    assert_eq!(system.simulate(0.1), SimOutcome::Finished);

    let data = system.log_data("SignalSink.in", "Value").unwrap();
    assert_eq!(data.len(), 11);
    // Samples reflect the value written in the step before them; the step
    // at t = 0.05 is first visible one sample later
    assert!(data[..6].iter().all(|&v| v == 1.0));
    assert!(data[6..].iter().all(|&v| v == 3.0));
}

#[test]
fn gain_chain_multiplies_through() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("model");
    system
        .add_component(engine.create_component("SignalSource").unwrap())
        .unwrap();
    system
        .add_component(engine.create_component("SignalGain").unwrap())
        .unwrap();
    system
        .add_component(engine.create_component("SignalGain").unwrap())
        .unwrap();
    system
        .add_component(engine.create_component("SignalSink").unwrap())
        .unwrap();

    system.set_parameter_value("SignalSource", "y", "2.0").unwrap();
    system.set_parameter_value("SignalGain", "k", "3.0").unwrap();
    system.set_parameter_value("SignalGain_1", "k", "-0.5").unwrap();
    system.connect("SignalSource", "out", "SignalGain", "in").unwrap();
    system
        .connect("SignalGain", "out", "SignalGain_1", "in")
        .unwrap();
    system
        .connect("SignalGain_1", "out", "SignalSink", "in")
        .unwrap();

    system.set_desired_timestep(0.001);
    system.initialize(0.0, 0.01).unwrap();
    system.simulate(0.01);

    assert_eq!(system.last_value("SignalSink.in", "Value").unwrap(), -3.0);
}
