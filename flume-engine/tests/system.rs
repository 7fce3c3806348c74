// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

mod common;

use flume_engine::parameters::ParameterValue;
use flume_engine::test_helpers::start_test;
use flume_engine::types::SimOutcome;

#[test]
fn duplicate_names_get_numeric_suffixes() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("model");
    let first = system
        .add_component(engine.create_component("SignalGain").unwrap())
        .unwrap();
    let second = system
        .add_component(engine.create_component("SignalGain").unwrap())
        .unwrap();
    let third = system
        .add_component(engine.create_component("SignalGain").unwrap())
        .unwrap();

    assert_eq!(first, "SignalGain");
    assert_eq!(second, "SignalGain_1");
    // The existing suffix is stripped before the next one is appended
    assert_eq!(third, "SignalGain_2");

    assert_eq!(
        system.component_names(),
        vec!["SignalGain", "SignalGain_1", "SignalGain_2"]
    );
}

#[test]
fn removed_component_frees_its_name() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("model");
    system
        .add_component(engine.create_component("SignalGain").unwrap())
        .unwrap();
    let released = system.remove_component("SignalGain").unwrap();
    assert_eq!(released.base().name(), "SignalGain");
    assert!(system.is_empty());

    // The name can be taken again
    let again = system
        .add_component(engine.create_component("SignalGain").unwrap())
        .unwrap();
    assert_eq!(again, "SignalGain");
}

#[test]
fn connected_component_cannot_be_removed() {
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

    assert!(system.remove_component("SignalSource").is_err());
    system
        .disconnect("SignalSource", "out", "SignalSink", "in")
        .unwrap();
    assert!(system.remove_component("SignalSource").is_ok());
}

#[test]
fn system_parameter_round_trip() {
    let engine = start_test(file!());
    let mut system = engine.create_system("model");

    system
        .set_system_parameter("K", "3.0", ParameterValue::Real(0.0))
        .unwrap();
    assert_eq!(
        system.system_parameters().get("K").unwrap().value(),
        &ParameterValue::Real(3.0)
    );

    // Overwriting keeps the single entry
    system
        .set_system_parameter("K", "4.5", ParameterValue::Real(0.0))
        .unwrap();
    assert_eq!(
        system.system_parameters().get("K").unwrap().value(),
        &ParameterValue::Real(4.5)
    );

    system.remove_system_parameter("K").unwrap();
    assert!(system.system_parameters().get("K").is_none());
    assert!(system.remove_system_parameter("K").is_err());
}

#[test]
fn dangling_system_parameter_binding_fails_initialize() {
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
    system
        .connect("SignalSource", "out", "SignalGain", "in")
        .unwrap();
    system
        .connect("SignalGain", "out", "SignalSink", "in")
        .unwrap();
    system.set_desired_timestep(0.01);

    system
        .set_system_parameter("K", "3.0", ParameterValue::Real(0.0))
        .unwrap();
    // "K" is not a real literal, so this creates a binding
    system.set_parameter_value("SignalGain", "k", "K").unwrap();
    assert_eq!(system.parameter_value("SignalGain", "k").unwrap(), "K");

    system.initialize(0.0, 0.05).unwrap();
    system.simulate(0.05);
    assert_eq!(system.last_value("SignalSink.in", "Value").unwrap(), 0.0);

    // Removing the bound target makes the next initialize fail, naming the
    // component parameter
    system.remove_system_parameter("K").unwrap();
    assert!(system.initialize(0.0, 0.05).is_err());
    assert_eq!(system.simulate(0.05), SimOutcome::NotReady);

    let mut found = false;
    while let Some(msg) = engine.pop_message() {
        if msg.severity == log::Level::Error && msg.text.contains("'k'") {
            found = true;
        }
    }
    assert!(found);
}

#[test]
fn binding_tracks_the_system_parameter_value() {
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
    system
        .connect("SignalSource", "out", "SignalGain", "in")
        .unwrap();
    system
        .connect("SignalGain", "out", "SignalSink", "in")
        .unwrap();
    system.set_desired_timestep(0.01);
    system.set_parameter_value("SignalSource", "y", "1.0").unwrap();

    system
        .set_system_parameter("K", "3.0", ParameterValue::Real(0.0))
        .unwrap();
    system.set_parameter_value("SignalGain", "k", "K").unwrap();

    system.initialize(0.0, 0.05).unwrap();
    system.simulate(0.05);
    assert_eq!(system.last_value("SignalSink.in", "Value").unwrap(), 3.0);

    // Late binding: a new value is picked up by the next run
    system
        .set_system_parameter("K", "5.0", ParameterValue::Real(0.0))
        .unwrap();
    system.initialize(0.0, 0.05).unwrap();
    system.simulate(0.05);
    assert_eq!(system.last_value("SignalSink.in", "Value").unwrap(), 5.0);
}

#[test]
fn illegal_parameter_text_is_refused_without_mutation() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("model");
    system
        .add_component(engine.create_component("SignalGain").unwrap())
        .unwrap();
    system.set_parameter_value("SignalGain", "k", "2.0").unwrap();
    assert!(system.set_parameter_value("SignalGain", "k", "2.0.1").is_err());
    assert_eq!(system.parameter_value("SignalGain", "k").unwrap(), "2");
}

#[test]
fn shared_namespace_rejects_collisions() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("model");
    system
        .add_component(engine.create_component("SignalGain").unwrap())
        .unwrap();

    // A system parameter cannot shadow a component name
    assert!(
        system
            .set_system_parameter("SignalGain", "1.0", ParameterValue::Real(0.0))
            .is_err()
    );
    // Nor can an alias
    assert!(
        system
            .set_parameter_alias("SignalGain", "SignalGain", "k")
            .is_err()
    );

    // System ports are uniquified against the same namespace
    let port_name = system.add_system_port("SignalGain").unwrap();
    assert_eq!(port_name, "SignalGain_1");
}

#[test]
fn parameter_alias_resolves_and_follows_renames() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("model");
    system
        .add_component(engine.create_component("SignalGain").unwrap())
        .unwrap();
    system.set_parameter_value("SignalGain", "k", "2.5").unwrap();
    system
        .set_parameter_alias("loop_gain", "SignalGain", "k")
        .unwrap();

    assert_eq!(system.parameter_value_by_alias("loop_gain").unwrap(), "2.5");

    system.rename_component("SignalGain", "FeedbackGain").unwrap();
    assert_eq!(system.parameter_value_by_alias("loop_gain").unwrap(), "2.5");

    system.remove_alias("loop_gain").unwrap();
    assert!(system.parameter_value_by_alias("loop_gain").is_err());
}
