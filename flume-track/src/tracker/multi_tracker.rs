// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A tracker that fans events out to several other trackers.

use crate::Tag;
use crate::tracker::{Track, Tracker};

/// Forward every event to each of the wrapped trackers.
///
/// Tag allocation is delegated to the first tracker so that tags stay unique
/// across the set; the remaining trackers only receive events.
pub struct MultiTracker {
    trackers: Vec<Tracker>,
}

impl MultiTracker {
    /// Create a [`MultiTracker`] wrapping the given trackers.
    ///
    /// # Panics
    ///
    /// Panics if `trackers` is empty.
    #[must_use]
    pub fn new(trackers: Vec<Tracker>) -> Self {
        assert!(!trackers.is_empty(), "MultiTracker needs at least one sink");
        Self { trackers }
    }
}

impl Track for MultiTracker {
    fn unique_tag(&self) -> Tag {
        self.trackers[0].unique_tag()
    }

    fn is_entity_enabled(&self, tag: Tag, level: log::Level) -> bool {
        self.trackers
            .iter()
            .any(|t| t.is_entity_enabled(tag, level))
    }

    fn add_entity(&self, tag: Tag, entity_name: &str) {
        for t in &self.trackers {
            t.add_entity(tag, entity_name);
        }
    }

    fn create(&self, created_by: Tag, created_obj: Tag, name: &str) {
        for t in &self.trackers {
            t.create(created_by, created_obj, name);
        }
    }

    fn destroy(&self, destroyed_by: Tag, destroyed_obj: Tag) {
        for t in &self.trackers {
            t.destroy(destroyed_by, destroyed_obj);
        }
    }

    fn connect(&self, connect_from: Tag, connect_to: Tag) {
        for t in &self.trackers {
            t.connect(connect_from, connect_to);
        }
    }

    fn log(&self, msg_by: Tag, level: log::Level, msg: std::fmt::Arguments) {
        for t in &self.trackers {
            if t.is_entity_enabled(msg_by, level) {
                t.log(msg_by, level, msg);
            }
        }
    }

    fn time(&self, set_by: Tag, time_s: f64) {
        for t in &self.trackers {
            t.time(set_by, time_s);
        }
    }

    fn shutdown(&self) {
        for t in &self.trackers {
            t.shutdown();
        }
    }
}
