// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A tracker that renders every event as a line of text.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::tracker::{EntityManager, Track};
use crate::{SharedWriter, Tag, Writer};

/// A tracker that writes human-readable text to a [`Writer`].
///
/// Entity names are resolved through the names recorded by
/// [`add_entity`](Track::add_entity), so log lines carry the full
/// hierarchical name of their originator.
pub struct TextTracker {
    entity_manager: Arc<EntityManager>,
    writer: SharedWriter,
    names: Mutex<HashMap<Tag, String>>,
}

impl TextTracker {
    /// Create a new [`TextTracker`] with an [`EntityManager`].
    pub fn new(entity_manager: EntityManager, writer: Writer) -> Self {
        Self {
            entity_manager: Arc::new(entity_manager),
            writer: Arc::new(Mutex::new(writer)),
            names: Mutex::new(HashMap::new()),
        }
    }

    fn name_for(&self, tag: Tag) -> String {
        match self.names.lock().unwrap().get(&tag) {
            Some(name) => name.clone(),
            None => format!("#{tag}"),
        }
    }

    fn write_line(&self, line: &str) {
        let time = self.entity_manager.time();
        let mut writer = self.writer.lock().unwrap();
        // Ignore write failures, diagnostics must never abort a simulation
        let _ = writeln!(writer, "[{time:.9}] {line}");
    }
}

impl Track for TextTracker {
    fn unique_tag(&self) -> Tag {
        self.entity_manager.unique_tag()
    }

    fn is_entity_enabled(&self, tag: Tag, level: log::Level) -> bool {
        self.entity_manager.is_enabled(tag, level)
    }

    fn add_entity(&self, tag: Tag, entity_name: &str) {
        self.entity_manager.add_entity(tag, entity_name);
        self.names
            .lock()
            .unwrap()
            .insert(tag, entity_name.to_owned());
    }

    fn create(&self, _created_by: Tag, created_obj: Tag, name: &str) {
        self.names
            .lock()
            .unwrap()
            .entry(created_obj)
            .or_insert_with(|| name.to_owned());
        self.write_line(&format!("TRACE created {name}"));
    }

    fn destroy(&self, destroyed_by: Tag, _destroyed_obj: Tag) {
        let name = self.name_for(destroyed_by);
        self.write_line(&format!("TRACE destroyed {name}"));
    }

    fn connect(&self, connect_from: Tag, connect_to: Tag) {
        let from = self.name_for(connect_from);
        let to = self.name_for(connect_to);
        self.write_line(&format!("TRACE connect {from} -> {to}"));
    }

    fn log(&self, msg_by: Tag, level: log::Level, msg: std::fmt::Arguments) {
        let name = self.name_for(msg_by);
        self.write_line(&format!("{level} {name}: {msg}"));
    }

    fn time(&self, _set_by: Tag, time_s: f64) {
        self.entity_manager.set_time(time_s);
    }

    fn shutdown(&self) {
        let _ = self.writer.lock().unwrap().flush();
    }
}
