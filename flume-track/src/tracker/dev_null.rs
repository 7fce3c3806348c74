// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A tracker that discards everything.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::tracker::Track;
use crate::{ROOT, Tag};

/// A tracker that suppresses all output.
///
/// Tags must still be unique so allocation is the only work this tracker
/// performs.
pub struct DevNullTracker {}

static NEXT_TAG: AtomicU64 = AtomicU64::new(ROOT.0 + 1);

impl Track for DevNullTracker {
    fn unique_tag(&self) -> Tag {
        Tag(NEXT_TAG.fetch_add(1, Ordering::SeqCst))
    }

    fn is_entity_enabled(&self, _tag: Tag, _level: log::Level) -> bool {
        false
    }

    fn add_entity(&self, _tag: Tag, _entity_name: &str) {}

    fn create(&self, _created_by: Tag, _created_obj: Tag, _name: &str) {}

    fn destroy(&self, _destroyed_by: Tag, _destroyed_obj: Tag) {}

    fn connect(&self, _connect_from: Tag, _connect_to: Tag) {}

    fn log(&self, _msg_by: Tag, _level: log::Level, _msg: std::fmt::Arguments) {}

    fn time(&self, _set_by: Tag, _time_s: f64) {}

    fn shutdown(&self) {}
}
