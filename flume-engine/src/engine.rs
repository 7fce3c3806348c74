// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! The engine facade.
//!
//! An [`Engine`] bundles the process-wide concerns behind one context
//! object: the tracker, the message bus, the node and component factories
//! and the external-library loader. Nothing here is global state, so tests
//! can run several independent engines in one process.

use std::path::Path;
use std::sync::Arc;

use flume_track::entity::{Entity, toplevel};
use flume_track::tracker::bus::{BusTracker, CoreMessage, DEFAULT_BUS_CAPACITY};
use flume_track::tracker::{EntityManager, MultiTracker, stdout_tracker};
use flume_track::{Tracker, error};

use crate::component::BoxedModel;
use crate::external::{ComponentFactory, ExternalLoader};
use crate::node::{NodeFactory, register_nodes};
use crate::system::System;
use crate::types::{SimError, SimResult};

/// The entry point of the core: creates systems and components, loads
/// external libraries, and serves the message bus.
pub struct Engine {
    tracker: Tracker,
    bus: Arc<BusTracker>,
    top: Arc<Entity>,
    component_factory: Arc<ComponentFactory>,
    node_factory: Arc<NodeFactory>,
    loader: ExternalLoader,
}

impl Engine {
    /// Create an engine that forwards track events to the given tracker and
    /// additionally retains diagnostics on an internal message bus.
    #[must_use]
    pub fn new(tracker: &Tracker) -> Self {
        let bus = Arc::new(BusTracker::new(
            Arc::new(EntityManager::new(log::Level::Debug)),
            DEFAULT_BUS_CAPACITY,
        ));
        let sinks: Vec<Tracker> = vec![tracker.clone(), bus.clone()];
        let tracker: Tracker = Arc::new(MultiTracker::new(sinks));
        let top = toplevel(&tracker, "top");

        let node_factory = Arc::new(NodeFactory::new());
        if let Err(e) = register_nodes(&node_factory) {
            // Only reachable if the built-in registrations collide with
            // themselves, which is a programming error
            error!(top ; "Registering built-in nodes failed: {e}");
        }

        Self {
            tracker,
            bus,
            top,
            component_factory: Arc::new(ComponentFactory::new()),
            node_factory,
            loader: ExternalLoader::new(),
        }
    }

    /// The top-level entity every system hangs under.
    #[must_use]
    pub fn top(&self) -> &Arc<Entity> {
        &self.top
    }

    /// The combined tracker (caller's sinks plus the message bus).
    #[must_use]
    pub fn tracker(&self) -> Tracker {
        self.tracker.clone()
    }

    /// Create an empty top-level system.
    #[must_use]
    pub fn create_system(&self, name: &str) -> System {
        System::new(&self.tracker, &self.top, name, &self.node_factory)
    }

    /// Create a component from its registered type key.
    pub fn create_component(&self, type_key: &str) -> Result<BoxedModel, SimError> {
        match self.component_factory.get(type_key) {
            Some(creator) => Ok(creator()),
            None => {
                let e = SimError(format!("No component type '{type_key}' is registered"));
                error!(self.top ; "{e}");
                Err(e)
            }
        }
    }

    /// The component factory, for registration by component libraries.
    #[must_use]
    pub fn component_factory(&self) -> &Arc<ComponentFactory> {
        &self.component_factory
    }

    /// The node-descriptor factory.
    #[must_use]
    pub fn node_factory(&self) -> &Arc<NodeFactory> {
        &self.node_factory
    }

    /// Load an external component library; its entry point receives both
    /// factories and self-registers.
    pub fn load_external_component_lib(&mut self, path: &Path) -> SimResult {
        let result = self
            .loader
            .load(path, &self.component_factory, &self.node_factory);
        if let Err(e) = &result {
            error!(self.top ; "{e}");
        }
        result
    }

    /// Remove and return the oldest waiting diagnostic message.
    #[must_use]
    pub fn pop_message(&self) -> Option<CoreMessage> {
        self.bus.pop_message()
    }

    /// Number of diagnostic messages waiting on the bus.
    #[must_use]
    pub fn num_messages(&self) -> usize {
        self.bus.num_messages()
    }

    /// The message bus itself, for richer assertions in tests and hosts.
    #[must_use]
    pub fn bus(&self) -> &Arc<BusTracker> {
        &self.bus
    }
}

/// Create a default engine that prints warnings and errors to stdout.
///
/// This is provided to keep documentation examples simple with fewer
/// concepts to have to consider at once.
impl Default for Engine {
    fn default() -> Self {
        let tracker = stdout_tracker(log::Level::Warn);
        Self::new(&tracker)
    }
}
