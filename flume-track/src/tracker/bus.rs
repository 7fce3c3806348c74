// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! A bounded in-memory message bus.
//!
//! The bus retains the most recent messages emitted by the simulation so that
//! a host application (GUI, scripting frontend, test harness) can drain them
//! with [`pop_message`](BusTracker::pop_message). When the queue is full the
//! oldest message is dropped.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::Tag;
use crate::tracker::{EntityManager, Track};

/// One diagnostic message retained by the [`BusTracker`].
#[derive(Debug, Clone)]
pub struct CoreMessage {
    /// Message severity. `Warn` and below are ordinary diagnostics, `Error`
    /// indicates a refused operation or a failed initialize.
    pub severity: log::Level,

    /// The message text.
    pub text: String,

    /// Full hierarchical name of the entity that emitted the message.
    pub origin: String,

    /// Simulation time at which the message was emitted.
    pub time: f64,
}

struct BusState {
    queue: VecDeque<CoreMessage>,
    names: HashMap<Tag, String>,
}

/// A tracker that keeps a bounded FIFO of messages.
pub struct BusTracker {
    entity_manager: Arc<EntityManager>,
    state: Mutex<BusState>,
    capacity: usize,
}

/// Default upper bound on retained messages.
pub const DEFAULT_BUS_CAPACITY: usize = 20;

impl BusTracker {
    /// Create a new [`BusTracker`] with an [`EntityManager`] and a maximum
    /// queue length.
    pub fn new(entity_manager: Arc<EntityManager>, capacity: usize) -> Self {
        Self {
            entity_manager,
            state: Mutex::new(BusState {
                queue: VecDeque::with_capacity(capacity),
                names: HashMap::new(),
            }),
            capacity,
        }
    }

    /// Remove and return the oldest waiting message.
    pub fn pop_message(&self) -> Option<CoreMessage> {
        self.state.lock().unwrap().queue.pop_front()
    }

    /// Number of messages currently waiting on the bus.
    pub fn num_messages(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    /// Drain every waiting message of the given severity.
    pub fn drain_severity(&self, severity: log::Level) -> Vec<CoreMessage> {
        let mut state = self.state.lock().unwrap();
        let (matching, rest): (VecDeque<CoreMessage>, VecDeque<CoreMessage>) =
            state.queue.drain(..).partition(|m| m.severity == severity);
        state.queue = rest;
        Vec::from(matching)
    }

    fn push(&self, message: CoreMessage) {
        let mut state = self.state.lock().unwrap();
        state.queue.push_back(message);
        // Oldest unhandled messages are dropped once the queue is full
        while state.queue.len() > self.capacity {
            state.queue.pop_front();
        }
    }
}

impl Track for BusTracker {
    fn unique_tag(&self) -> Tag {
        self.entity_manager.unique_tag()
    }

    fn is_entity_enabled(&self, tag: Tag, level: log::Level) -> bool {
        self.entity_manager.is_enabled(tag, level)
    }

    fn add_entity(&self, tag: Tag, entity_name: &str) {
        self.entity_manager.add_entity(tag, entity_name);
        self.state
            .lock()
            .unwrap()
            .names
            .insert(tag, entity_name.to_owned());
    }

    fn create(&self, _created_by: Tag, created_obj: Tag, name: &str) {
        self.state
            .lock()
            .unwrap()
            .names
            .entry(created_obj)
            .or_insert_with(|| name.to_owned());
    }

    fn destroy(&self, _destroyed_by: Tag, _destroyed_obj: Tag) {
        // The bus only retains log messages
    }

    fn connect(&self, _connect_from: Tag, _connect_to: Tag) {
        // The bus only retains log messages
    }

    fn log(&self, msg_by: Tag, level: log::Level, msg: std::fmt::Arguments) {
        let origin = {
            let state = self.state.lock().unwrap();
            match state.names.get(&msg_by) {
                Some(name) => name.clone(),
                None => format!("#{msg_by}"),
            }
        };
        self.push(CoreMessage {
            severity: level,
            text: format!("{msg}"),
            origin,
            time: self.entity_manager.time(),
        });
    }

    fn time(&self, _set_by: Tag, time_s: f64) {
        self.entity_manager.set_time(time_s);
    }

    fn shutdown(&self) {
        // Do nothing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus() -> BusTracker {
        BusTracker::new(Arc::new(EntityManager::new(log::Level::Debug)), 3)
    }

    #[test]
    fn fifo_order() {
        let bus = bus();
        let tag = bus.unique_tag();
        bus.add_entity(tag, "top");
        bus.log(tag, log::Level::Info, format_args!("first"));
        bus.log(tag, log::Level::Warn, format_args!("second"));

        assert_eq!(bus.num_messages(), 2);
        let first = bus.pop_message().unwrap();
        assert_eq!(first.text, "first");
        assert_eq!(first.severity, log::Level::Info);
        assert_eq!(first.origin, "top");
        assert_eq!(bus.pop_message().unwrap().text, "second");
        assert!(bus.pop_message().is_none());
    }

    #[test]
    fn oldest_dropped_when_full() {
        let bus = bus();
        let tag = bus.unique_tag();
        bus.add_entity(tag, "top");
        for i in 0..5 {
            bus.log(tag, log::Level::Info, format_args!("msg {i}"));
        }

        assert_eq!(bus.num_messages(), 3);
        assert_eq!(bus.pop_message().unwrap().text, "msg 2");
    }
}
