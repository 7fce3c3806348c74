// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

mod common;

use flume_engine::test_helpers::start_test;
use flume_engine::types::{CqsType, SimOutcome};

/// A signal crosses a system boundary: the outer source connects to the
/// child's system port, which forwards to the node the inner gain reads.
#[test]
fn signal_flows_through_a_system_port() {
    let engine = start_test(file!());
    flume_components::register(engine.component_factory()).unwrap();

    let mut filter = engine.create_system("filter");
    filter.add_system_port("in").unwrap();
    filter
        .add_component(engine.create_component("SignalGain").unwrap())
        .unwrap();
    filter
        .add_component(engine.create_component("SignalSink").unwrap())
        .unwrap();
    filter.set_parameter_value("SignalGain", "k", "4.0").unwrap();
    // Interior side first: this creates the node the boundary forwards to
    filter.connect("SignalGain", "in", "filter", "in").unwrap();
    filter.connect("SignalGain", "out", "SignalSink", "in").unwrap();

    // A signal-only boundary derives an S-type container
    assert_eq!(
        flume_engine::component::Model::base(&filter).cqs_type(),
        CqsType::S
    );

    let mut system = engine.create_system("model");
    system
        .add_component(engine.create_component("SignalSource").unwrap())
        .unwrap();
    system.add_component(Box::new(filter)).unwrap();
    system.set_parameter_value("SignalSource", "y", "2.5").unwrap();
    system.connect("SignalSource", "out", "filter", "in").unwrap();

    system.set_desired_timestep(0.01);
    system.initialize(0.0, 0.05).unwrap();
    assert_eq!(system.simulate(0.05), SimOutcome::Finished);

    assert_eq!(
        system.last_value("filter.SignalSink.in", "Value").unwrap(),
        10.0
    );
    system.check_invariants().unwrap();
}
