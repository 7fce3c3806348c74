// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

mod common;

use flume_engine::test_helpers::start_test;

#[test]
fn c_type_power_ports_cannot_share_a_node() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("model");
    system
        .add_component(engine.create_component("HydraulicPressureSourceC").unwrap())
        .unwrap();
    system
        .add_component(engine.create_component("HydraulicVolume").unwrap())
        .unwrap();

    let result = system.connect(
        "HydraulicPressureSourceC",
        "p1",
        "HydraulicVolume",
        "p1",
    );
    assert!(result.is_err());

    // No node was created and both ports remain unconnected
    assert!(system.sub_nodes().is_empty());
    assert!(
        !system
            .port_of("HydraulicPressureSourceC", "p1")
            .unwrap()
            .is_connected()
    );
    assert!(!system.port_of("HydraulicVolume", "p1").unwrap().is_connected());

    // An Error message was enqueued
    let mut found = false;
    while let Some(msg) = engine.pop_message() {
        if msg.severity == log::Level::Error && msg.text.contains("C-type") {
            found = true;
        }
    }
    assert!(found);
    system.check_invariants().unwrap();
}

#[test]
fn q_type_power_ports_cannot_share_a_node() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("model");
    system
        .add_component(engine.create_component("HydraulicLaminarOrifice").unwrap())
        .unwrap();
    system
        .add_component(engine.create_component("HydraulicTank").unwrap())
        .unwrap();

    assert!(
        system
            .connect("HydraulicLaminarOrifice", "p2", "HydraulicTank", "p1")
            .is_err()
    );
    assert!(system.sub_nodes().is_empty());
}

#[test]
fn node_type_mismatch_is_rejected() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("model");
    system
        .add_component(engine.create_component("SignalSource").unwrap())
        .unwrap();
    system
        .add_component(engine.create_component("HydraulicTank").unwrap())
        .unwrap();

    assert!(
        system
            .connect("SignalSource", "out", "HydraulicTank", "p1")
            .is_err()
    );
    assert!(system.sub_nodes().is_empty());
}

#[test]
fn only_read_ports_have_no_source() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("model");
    system
        .add_component(engine.create_component("SignalSink").unwrap())
        .unwrap();
    system
        .add_component(engine.create_component("SignalGain").unwrap())
        .unwrap();

    assert!(system.connect("SignalSink", "in", "SignalGain", "in").is_err());
    assert!(system.sub_nodes().is_empty());
}

#[test]
fn connect_disconnect_round_trip() {
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
    assert_eq!(system.sub_nodes().len(), 1);
    system.check_invariants().unwrap();

    system
        .disconnect("SignalSource", "out", "SignalSink", "in")
        .unwrap();
    assert!(system.sub_nodes().is_empty());
    assert!(!system.port_of("SignalSource", "out").unwrap().is_connected());
    assert!(!system.port_of("SignalSink", "in").unwrap().is_connected());
    system.check_invariants().unwrap();

    // The same pair can connect again afterwards
    system
        .connect("SignalSource", "out", "SignalSink", "in")
        .unwrap();
    assert_eq!(system.sub_nodes().len(), 1);
}

#[test]
fn redundant_connect_is_a_no_op_success() {
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
        .connect("SignalSource", "out", "SignalSink", "in")
        .unwrap();
    assert_eq!(system.sub_nodes().len(), 1);
    assert_eq!(
        system
            .port_of("SignalSink", "in")
            .unwrap()
            .node()
            .unwrap()
            .connected_ports()
            .len(),
        2
    );
}

#[test]
fn fan_in_through_a_read_multi_port() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("model");
    system
        .add_component(engine.create_component("SignalSource").unwrap())
        .unwrap();
    let second = system
        .add_component(engine.create_component("SignalSource").unwrap())
        .unwrap();
    assert_eq!(second, "SignalSource_1");
    system
        .add_component(engine.create_component("SignalSum").unwrap())
        .unwrap();
    system
        .add_component(engine.create_component("SignalSink").unwrap())
        .unwrap();

    system.set_parameter_value("SignalSource", "y", "1.5").unwrap();
    system.set_parameter_value("SignalSource_1", "y", "2.0").unwrap();
    system.connect("SignalSource", "out", "SignalSum", "in").unwrap();
    system
        .connect("SignalSource_1", "out", "SignalSum", "in")
        .unwrap();
    system.connect("SignalSum", "out", "SignalSink", "in").unwrap();

    // One sub-port per connection
    assert_eq!(system.port_of("SignalSum", "in").unwrap().num_ports(), 2);
    system.check_invariants().unwrap();

    system.set_desired_timestep(0.01);
    system.initialize(0.0, 0.05).unwrap();
    system.simulate(0.05);
    assert_eq!(system.last_value("SignalSink.in", "Value").unwrap(), 3.5);

    // Disconnecting removes exactly the matching sub-port
    system
        .disconnect("SignalSource_1", "out", "SignalSum", "in")
        .unwrap();
    assert_eq!(system.port_of("SignalSum", "in").unwrap().num_ports(), 1);
    system.check_invariants().unwrap();
}

#[test]
fn system_port_adopts_and_forgets_node_type() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut system = engine.create_system("model");
    system.add_system_port("boundary").unwrap();
    system
        .add_component(engine.create_component("SignalSource").unwrap())
        .unwrap();

    assert!(system.port_of("model", "boundary").unwrap().node_type().is_none());
    system.connect("SignalSource", "out", "model", "boundary").unwrap();
    assert_eq!(
        system.port_of("model", "boundary").unwrap().node_type(),
        Some("signal")
    );

    system
        .disconnect("SignalSource", "out", "model", "boundary")
        .unwrap();
    assert!(system.port_of("model", "boundary").unwrap().node_type().is_none());
}
