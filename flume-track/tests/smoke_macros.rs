// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

use std::sync::Arc;

use flume_track::entity::{Entity, toplevel};
use flume_track::test_helpers::check_and_clear;
use flume_track::tracker::EntityManager;
use flume_track::tracker::bus::BusTracker;
use flume_track::{Tracker, test_init};

#[test]
fn entity_lifecycle_events() {
    let (test_tracker, tracker) = test_init!(10);

    {
        let top = toplevel(&tracker, "top");
        let pump = Arc::new(Entity::new(&top, "pump"));
        flume_track::info!(pump ; "priming");
        flume_track::connect!(top ; pump);

        check_and_clear(
            &test_tracker,
            &[
                "0: created 10, top",
                "10: created 11, top::pump",
                "11:INFO: priming",
                "10: connect to 11",
            ],
        );
        drop(pump);
        drop(top);
    }

    // Entities emit destroy events as they drop, children first
    check_and_clear(&test_tracker, &["11: destroyed 10", "10: destroyed 0"]);
}

#[test]
fn bus_collects_entity_messages() {
    let bus = Arc::new(BusTracker::new(
        Arc::new(EntityManager::new(log::Level::Info)),
        8,
    ));
    let tracker: Tracker = bus.clone();

    let top = toplevel(&tracker, "top");
    let valve = Arc::new(Entity::new(&top, "valve"));

    flume_track::warn!(valve ; "stuck at {:.1}%", 42.0);
    // Debug is below the configured level and must be filtered out
    flume_track::debug!(valve ; "should not appear");

    assert_eq!(bus.num_messages(), 1);
    let msg = bus.pop_message().unwrap();
    assert_eq!(msg.severity, log::Level::Warn);
    assert_eq!(msg.text, "stuck at 42.0%");
    assert_eq!(msg.origin, "top::valve");
}
