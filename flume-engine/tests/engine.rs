// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

mod common;

use flume_engine::test_helpers::start_test;
use flume_engine::types::SimOutcome;

#[test]
fn signal_chain_end_to_end() {
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
        .add_component(engine.create_component("SignalSink").unwrap())
        .unwrap();

    system.set_parameter_value("SignalSource", "y", "5.0").unwrap();
    system.set_parameter_value("SignalGain", "k", "2.0").unwrap();
    system
        .connect("SignalSource", "out", "SignalGain", "in")
        .unwrap();
    system
        .connect("SignalGain", "out", "SignalSink", "in")
        .unwrap();

    system.set_desired_timestep(0.01);
    system.initialize_with_samples(0.0, 0.05, 6).unwrap();
    assert_eq!(system.simulate(0.05), SimOutcome::Finished);

    let data = system.log_data("SignalSink.in", "Value").unwrap();
    assert_eq!(data, vec![10.0; 6]);

    let times = system.time_vector("SignalSink.in").unwrap();
    assert_eq!(times.len(), 6);
    assert!((times[5] - 0.05).abs() < 1e-9);

    system.check_invariants().unwrap();
}

#[test]
fn unknown_component_type_is_reported() {
    let engine = start_test(file!());
    assert!(engine.create_component("NoSuchThing").is_err());

    let mut found = false;
    while let Some(msg) = engine.pop_message() {
        if msg.severity == log::Level::Error && msg.text.contains("NoSuchThing") {
            found = true;
        }
    }
    assert!(found);
}

#[test]
fn duplicate_type_registration_rejected() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();
    // A second registration pass collides on the first key and leaves the
    // factory unchanged
    assert!(flume_components::register(engine.component_factory()).is_err());
    assert!(engine.component_factory().has_key("SignalGain"));
}

#[test]
fn missing_external_library_is_reported() {
    let mut engine = start_test(file!());
    let result =
        engine.load_external_component_lib(std::path::Path::new("/nonexistent/libparts.so"));
    assert!(result.is_err());
    assert!(engine.num_messages() > 0);
}

#[test]
fn failing_component_initialize_aborts() {
    let engine = start_test(file!());
    let mut system = engine.create_system("model");
    system
        .add_component(common::BrokenInit::creator())
        .unwrap();

    assert!(system.initialize(0.0, 1.0).is_err());
    // Refuses to simulate in the failed state
    assert_eq!(system.simulate(1.0), SimOutcome::NotReady);

    let mut found = false;
    while let Some(msg) = engine.pop_message() {
        if msg.severity == log::Level::Error && msg.text.contains("self-diagnostic") {
            found = true;
        }
    }
    assert!(found);
}

#[test]
fn alias_resolves_variable_path() {
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
    system
        .set_variable_alias("result", "SignalSink", "in", "Value")
        .unwrap();

    system.set_parameter_value("SignalSource", "y", "7.5").unwrap();
    system.set_desired_timestep(0.01);
    system.initialize(0.0, 0.02).unwrap();
    system.simulate(0.02);

    assert_eq!(system.last_value("result", "").unwrap(), 7.5);

    // Renaming the component rewrites the alias
    system.rename_component("SignalSink", "Drain").unwrap();
    assert_eq!(system.last_value("result", "").unwrap(), 7.5);
    system.check_invariants().unwrap();
}
