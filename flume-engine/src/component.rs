// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! Components: the entities that carry model behaviour.
//!
//! A component is a [`ComponentBase`] (name, CQS role, ports, parameters,
//! time base) plus behaviour supplied through the [`Model`] trait. The CQS
//! distinction is data (a [`CqsType`] tag on the base), not a type
//! hierarchy: the scheduler and the connection assistant read the tag, and
//! a component's behaviour hooks are the same four whatever its role.
//!
//! Concrete components register their ports and parameters in their
//! constructor, cache parameter values in `initialize`, and do their work in
//! `simulate_one_timestep`. The provided [`Model::simulate`] drives the
//! sub-stepping loop, which is what makes multi-rate subsystems work: a
//! parent asks any child to cover `[t, t + parent_ts)` and the child
//! iterates its own (finer) step until it has.

use std::sync::Arc;

use flume_track::entity::Entity;

use crate::parameters::{ParameterSet, ParameterValue};
use crate::port::Port;
use crate::sim_error;
use crate::system::System;
use crate::types::{CqsType, PortRole, Requirement, SimResult};

/// Default desired timestep of a freshly constructed component [s].
pub const DEFAULT_TIMESTEP: f64 = 0.001;

/// Handle to a port registered on a [`ComponentBase`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PortId(pub(crate) usize);

/// The data shared by every component.
pub struct ComponentBase {
    name: String,
    type_name: String,
    cqs: CqsType,
    timestep: f64,
    desired_timestep: f64,
    inherit_timestep: bool,
    time: f64,
    ports: Vec<Port>,
    parameters: ParameterSet,
    measured_time: f64,
    entity: Option<Arc<Entity>>,
}

impl ComponentBase {
    /// Create a base for a component of the given registry type name and
    /// CQS role. The name is assigned by the system on
    /// [`add_component`](crate::system::System::add_component).
    #[must_use]
    pub fn new(type_name: &str, cqs: CqsType) -> Self {
        Self {
            name: type_name.to_owned(),
            type_name: type_name.to_owned(),
            cqs,
            timestep: DEFAULT_TIMESTEP,
            desired_timestep: DEFAULT_TIMESTEP,
            inherit_timestep: true,
            time: 0.0,
            ports: Vec::new(),
            parameters: ParameterSet::new(),
            measured_time: 0.0,
            entity: None,
        }
    }

    /// The component name, unique within its parent system.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_owned();
    }

    /// The registry key this component was created from.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The CQS role of this component.
    #[must_use]
    pub fn cqs_type(&self) -> CqsType {
        self.cqs
    }

    pub(crate) fn set_cqs_type(&mut self, cqs: CqsType) {
        self.cqs = cqs;
    }

    /// The effective timestep, assigned by the parent at `initialize`.
    #[must_use]
    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    pub(crate) fn set_timestep(&mut self, timestep: f64) {
        self.timestep = timestep;
    }

    /// The timestep this component asks for.
    #[must_use]
    pub fn desired_timestep(&self) -> f64 {
        self.desired_timestep
    }

    /// Request a timestep; clears the inherit flag.
    pub fn set_desired_timestep(&mut self, timestep: f64) {
        self.desired_timestep = timestep;
        self.timestep = timestep;
        self.inherit_timestep = false;
    }

    /// Whether this component simply inherits the parent system timestep.
    #[must_use]
    pub fn inherits_timestep(&self) -> bool {
        self.inherit_timestep
    }

    /// Restore timestep inheritance from the parent system.
    pub fn set_inherit_timestep(&mut self, inherit: bool) {
        self.inherit_timestep = inherit;
    }

    /// Current simulation time of this component.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    pub(crate) fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    /// Wall time of one measured `simulate` call, used by the
    /// multi-threaded partitioner.
    #[must_use]
    pub fn measured_time(&self) -> f64 {
        self.measured_time
    }

    pub(crate) fn set_measured_time(&mut self, time: f64) {
        self.measured_time = time;
    }

    // --- entity / diagnostics ---

    /// The track entity, once the component has been added to a system.
    ///
    /// # Panics
    ///
    /// Panics if the component has not been adopted by a system yet.
    #[must_use]
    pub fn entity(&self) -> &Arc<Entity> {
        self.entity
            .as_ref()
            .expect("component used before being added to a system")
    }

    pub(crate) fn adopt(&mut self, parent: &Arc<Entity>, name: &str) {
        self.name = name.to_owned();
        self.entity = Some(Arc::new(Entity::new(parent, name)));
    }

    pub(crate) fn has_entity(&self) -> bool {
        self.entity.is_some()
    }

    // --- ports ---

    fn add_port(
        &mut self,
        name: &str,
        role: PortRole,
        node_type: Option<&str>,
        requirement: Requirement,
    ) -> PortId {
        debug_assert!(
            !self.ports.iter().any(|p| p.name() == name),
            "duplicate port name"
        );
        self.ports.push(Port::new(
            name,
            role,
            node_type.map(str::to_owned),
            matches!(requirement, Requirement::Required),
        ));
        PortId(self.ports.len() - 1)
    }

    /// Register a bidirectional TLM power port.
    pub fn add_power_port(&mut self, name: &str, node_type: &str) -> PortId {
        self.add_port(name, PortRole::Power, Some(node_type), Requirement::Required)
    }

    /// Register a read port.
    pub fn add_read_port(
        &mut self,
        name: &str,
        node_type: &str,
        requirement: Requirement,
    ) -> PortId {
        self.add_port(name, PortRole::Read, Some(node_type), requirement)
    }

    /// Register a write port.
    pub fn add_write_port(
        &mut self,
        name: &str,
        node_type: &str,
        requirement: Requirement,
    ) -> PortId {
        self.add_port(name, PortRole::Write, Some(node_type), requirement)
    }

    /// Register a power multi-port ("fan-in/fan-out" topologies).
    pub fn add_power_multi_port(&mut self, name: &str, node_type: &str) -> PortId {
        self.add_port(
            name,
            PortRole::PowerMulti,
            Some(node_type),
            Requirement::Required,
        )
    }

    /// Register a read multi-port.
    pub fn add_read_multi_port(&mut self, name: &str, node_type: &str) -> PortId {
        self.add_port(
            name,
            PortRole::ReadMulti,
            Some(node_type),
            Requirement::NotRequired,
        )
    }

    /// Register a system port (containers only); the node type is adopted
    /// from whichever side connects first.
    pub fn add_system_port_untyped(&mut self, name: &str) -> PortId {
        self.add_port(name, PortRole::System, None, Requirement::NotRequired)
    }

    /// A registered port.
    #[must_use]
    pub fn port(&self, id: PortId) -> &Port {
        &self.ports[id.0]
    }

    /// A registered port, mutably.
    pub fn port_mut(&mut self, id: PortId) -> &mut Port {
        &mut self.ports[id.0]
    }

    /// Find a port by name.
    #[must_use]
    pub fn find_port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name() == name)
    }

    /// Find a port by name, mutably.
    pub fn find_port_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.ports.iter_mut().find(|p| p.name() == name)
    }

    pub(crate) fn remove_port(&mut self, name: &str) -> bool {
        let before = self.ports.len();
        self.ports.retain(|p| p.name() != name);
        self.ports.len() != before
    }

    pub(crate) fn port_index(&self, name: &str) -> Option<usize> {
        self.ports.iter().position(|p| p.name() == name)
    }

    pub(crate) fn port_at(&self, index: usize) -> &Port {
        &self.ports[index]
    }

    pub(crate) fn port_at_mut(&mut self, index: usize) -> &mut Port {
        &mut self.ports[index]
    }

    /// All ports of this component, in registration order.
    #[must_use]
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub(crate) fn ports_mut(&mut self) -> &mut [Port] {
        &mut self.ports
    }

    /// Read a node channel through a port.
    #[must_use]
    pub fn read(&self, port: PortId, slot: usize) -> f64 {
        self.ports[port.0].read_node(slot)
    }

    /// Write a node channel through a port.
    pub fn write(&self, port: PortId, slot: usize, value: f64) {
        self.ports[port.0].write_node(slot, value);
    }

    // --- parameters ---

    /// Register a parameter with its default value.
    pub fn register_parameter(
        &mut self,
        name: &str,
        description: &str,
        unit: &str,
        default: ParameterValue,
    ) {
        // Registration happens in constructors where a duplicate is a
        // programming error
        self.parameters
            .add(name, description, unit, default)
            .expect("duplicate parameter registration");
    }

    /// The parameter registry.
    #[must_use]
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// The parameter registry, mutably.
    pub fn parameters_mut(&mut self) -> &mut ParameterSet {
        &mut self.parameters
    }

    /// Check that every required port is connected, reporting the first
    /// failure.
    pub fn check_required_connections(&self) -> SimResult {
        for port in &self.ports {
            if port.is_connection_required() && !port.is_connected() {
                return sim_error!(
                    "Port '{}' on component '{}' must be connected",
                    port.name(),
                    self.name
                );
            }
        }
        Ok(())
    }
}

/// The behaviour contract of every component.
///
/// `initialize` is called before each run (after parameter evaluation and
/// start-value loading), `simulate_one_timestep` once per step and
/// `finalize` after the run. Configuration (ports, parameters) happens in
/// the component's constructor.
pub trait Model: Send {
    /// The shared component data.
    fn base(&self) -> &ComponentBase;

    /// The shared component data, mutably.
    fn base_mut(&mut self) -> &mut ComponentBase;

    /// Prepare for a run. Failure aborts the surrounding `initialize` and
    /// is surfaced as an error message.
    fn initialize(&mut self) -> SimResult {
        Ok(())
    }

    /// Advance the model by one timestep. `self.base().time()` is the time
    /// at the start of the step.
    fn simulate_one_timestep(&mut self);

    /// Clean up after a run.
    fn finalize(&mut self) {}

    /// Cover the interval `[start_t, stop_t)` with this component's own
    /// timestep. Subsystems override this to drive their phased loop.
    fn simulate(&mut self, start_t: f64, stop_t: f64) {
        let ts = self.base().timestep();
        // Half a timestep of slack avoids an extra step from trailing
        // float drift
        let stop_safe = stop_t - ts / 2.0;
        self.base_mut().set_time(start_t);
        while self.base().time() < stop_safe {
            self.simulate_one_timestep();
            let next = self.base().time() + ts;
            self.base_mut().set_time(next);
        }
    }

    /// Downcast to a system container, if this component is one.
    fn as_system(&self) -> Option<&System> {
        None
    }

    /// Downcast to a system container, mutably.
    fn as_system_mut(&mut self) -> Option<&mut System> {
        None
    }
}

/// The boxed form components take inside a system.
pub type BoxedModel = Box<dyn Model>;
