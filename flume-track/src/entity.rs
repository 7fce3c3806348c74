// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! The identity of a tracked simulation object.
//!
//! Engines, systems, components and ports each carry an [`Entity`]: the
//! object's place in the model hierarchy, its unique [`Tag`] and the shared
//! [`Tracker`] its diagnostics are routed through. Message origins like
//! `top::rig::pump::p1` are these entities' full names.
//!
//! An entity records only its parent's tag, not the parent itself; the full
//! hierarchical name is fixed at construction. Simulation objects are built
//! top-down and named once, so there is nothing to chase a parent pointer
//! for afterwards.

use std::fmt;
use std::sync::Arc;

use crate::{Tag, Tracker, create, destroy};

/// Joins the name segments of a hierarchical entity name.
pub const NAME_SEPARATOR: &str = "::";

/// One tracked simulation object.
///
/// Entities are created with [`toplevel`] for the root and
/// [`Entity::new`] for everything below it. Creation and destruction are
/// themselves track events, so a tracker sees the model hierarchy being
/// built and torn down.
pub struct Entity {
    /// The object's own name, e.g. `p1`.
    pub name: String,

    /// Tag of the parent entity; `None` only for the top level.
    pub parent_tag: Option<Tag>,

    /// Unique identifier used in trace events.
    pub tag: Tag,

    /// [`Tracker`] that receives this entity's trace/log events.
    pub tracker: Tracker,

    /// The full hierarchical name, fixed at construction.
    full_name: String,
}

impl Entity {
    /// Create an entity one level below `parent`.
    #[must_use]
    pub fn new(parent: &Arc<Entity>, name: &str) -> Self {
        let full_name = [parent.full_name(), name].join(NAME_SEPARATOR);
        let tracker = parent.tracker.clone();
        let tag = tracker.unique_tag();
        tracker.add_entity(tag, &full_name);

        let entity = Self {
            name: String::from(name),
            parent_tag: Some(parent.tag),
            tag,
            tracker,
            full_name,
        };

        create!(entity);

        entity
    }

    /// The full hierarchical name of this entity.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Whether this is the root of the hierarchy.
    #[must_use]
    pub fn is_toplevel(&self) -> bool {
        self.parent_tag.is_none()
    }
}

impl Drop for Entity {
    fn drop(&mut self) {
        destroy!(self);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("full_name", &self.full_name)
            .field("tag", &self.tag)
            .field("parent_tag", &self.parent_tag)
            .finish()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name)
    }
}

/// Create the top-level entity, the only one without a parent.
pub fn toplevel(tracker: &Tracker, name: &str) -> Arc<Entity> {
    let tag = tracker.unique_tag();
    tracker.add_entity(tag, name);
    let top = Arc::new(Entity {
        name: String::from(name),
        parent_tag: None,
        tag,
        tracker: tracker.clone(),
        full_name: String::from(name),
    });
    create!(top);
    top
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::dev_null_tracker;

    #[test]
    fn full_names_are_fixed_at_construction() {
        let tracker = dev_null_tracker();
        let top = toplevel(&tracker, "top");
        let rig = Arc::new(Entity::new(&top, "rig"));
        let pump = Entity::new(&rig, "pump");

        assert!(top.is_toplevel());
        assert!(!pump.is_toplevel());
        assert_eq!(pump.full_name(), "top::rig::pump");
        assert_eq!(pump.to_string(), "top::rig::pump");
        assert_eq!(pump.parent_tag, Some(rig.tag));
    }
}
