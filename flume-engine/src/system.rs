// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! The system container.
//!
//! A system is itself a component: it owns subcomponents (filed into C / Q /
//! S buckets by their CQS tag), the interior nodes created by the connection
//! assistant, its system ports, a system-parameter store, variable and
//! parameter aliases, and the simulation lifecycle. Systems nest: a
//! subsystem is just a component whose [`Model::simulate`] covers the parent
//! interval with its own (finer) timestep.
//!
//! The scheduler lives here for the single-threaded case: one outer
//! fixed-step loop that logs all interior nodes, then executes the S group,
//! the C group and the Q group. Signals settle first, then the C components
//! propagate the TLM across the step boundary, then the Q components solve
//! flow and effort against the fresh wave variables. The multi-threaded
//! variant is in [`executor`](crate::executor).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::Relaxed;

use flume_track::entity::Entity;
use flume_track::{Tracker, debug, error, info, set_time, warn};

use crate::component::{BoxedModel, ComponentBase, Model};
use crate::node::{Node, NodeFactory};
use crate::parameters::{ParameterValue, SystemParameters};
use crate::port::Port;
use crate::sim_error;
use crate::types::{CqsType, PortRole, SimError, SimOutcome, SimResult};

/// Default number of log samples requested per run.
pub const DEFAULT_NUM_LOG_SAMPLES: usize = 2048;

/// Shared cancellation flag; see [`System::stop_handle`].
pub type StopHandle = Arc<AtomicBool>;

/// What a reserved name is used for. All kinds share one namespace within
/// the system.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NameClass {
    /// A subcomponent name.
    Component,
    /// A system port name.
    SystemPort,
    /// A system parameter name.
    SystemParameter,
    /// A variable or parameter alias.
    Alias,
    /// Reserved by the host application.
    Reserved,
}

/// What an alias resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AliasTarget {
    /// A `(component, port, channel)` variable.
    Variable {
        /// Component name within the system.
        component: String,
        /// Port name on that component.
        port: String,
        /// Channel name within the port's node type.
        data_name: String,
    },
    /// A `(component, parameter)` pair.
    Parameter {
        /// Component name within the system.
        component: String,
        /// Parameter name on that component.
        parameter: String,
    },
}

/// The alias table of one system. Renaming or removing components and ports
/// rewrites or drops the aliases that reference them.
#[derive(Clone, Debug, Default)]
pub struct AliasRegistry {
    map: HashMap<String, AliasTarget>,
}

impl AliasRegistry {
    /// Resolve an alias.
    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&AliasTarget> {
        self.map.get(alias)
    }

    /// All alias names.
    #[must_use]
    pub fn aliases(&self) -> Vec<String> {
        let mut names: Vec<String> = self.map.keys().cloned().collect();
        names.sort();
        names
    }

    fn insert(&mut self, alias: &str, target: AliasTarget) {
        self.map.insert(alias.to_owned(), target);
    }

    fn remove(&mut self, alias: &str) -> bool {
        self.map.remove(alias).is_some()
    }

    fn component_renamed(&mut self, old_name: &str, new_name: &str) {
        for target in self.map.values_mut() {
            match target {
                AliasTarget::Variable { component, .. }
                | AliasTarget::Parameter { component, .. } => {
                    if component == old_name {
                        *component = new_name.to_owned();
                    }
                }
            }
        }
    }

    fn component_removed(&mut self, name: &str) -> Vec<String> {
        let stale: Vec<String> = self
            .map
            .iter()
            .filter(|(_, t)| match t {
                AliasTarget::Variable { component, .. }
                | AliasTarget::Parameter { component, .. } => component == name,
            })
            .map(|(alias, _)| alias.clone())
            .collect();
        for alias in &stale {
            self.map.remove(alias);
        }
        stale
    }

    fn port_renamed(&mut self, component_name: &str, old_port: &str, new_port: &str) {
        for target in self.map.values_mut() {
            if let AliasTarget::Variable { component, port, .. } = target
                && component == component_name
                && port == old_port
            {
                *port = new_port.to_owned();
            }
        }
    }

    fn port_removed(&mut self, component_name: &str, port_name: &str) -> Vec<String> {
        let stale: Vec<String> = self
            .map
            .iter()
            .filter(|(_, t)| {
                matches!(t, AliasTarget::Variable { component, port, .. }
                    if component == component_name && port == port_name)
            })
            .map(|(alias, _)| alias.clone())
            .collect();
        for alias in &stale {
            self.map.remove(alias);
        }
        stale
    }
}

/// A container component owning subcomponents, interior nodes and the
/// simulation lifecycle.
pub struct System {
    base: ComponentBase,
    tracker: Tracker,
    node_factory: Arc<NodeFactory>,
    pub(crate) components: Vec<BoxedModel>,
    pub(crate) nodes: Vec<Arc<Node>>,
    system_parameters: SystemParameters,
    aliases: AliasRegistry,
    taken_names: HashMap<String, NameClass>,
    pub(crate) stop_flag: StopHandle,
    num_log_samples: usize,
    log_start_time: f64,
    // Phase worklists, rebuilt at initialize
    pub(crate) s_order: Vec<usize>,
    pub(crate) c_order: Vec<usize>,
    pub(crate) q_order: Vec<usize>,
    explicit_cqs: bool,
    pub(crate) initialized: bool,
    finalized: bool,
    keep_start_values: bool,
}

impl System {
    /// Create a system under the given parent entity.
    #[must_use]
    pub fn new(
        tracker: &Tracker,
        parent: &Arc<Entity>,
        name: &str,
        node_factory: &Arc<NodeFactory>,
    ) -> Self {
        let mut base = ComponentBase::new("System", CqsType::Undefined);
        base.adopt(parent, name);
        Self {
            base,
            tracker: tracker.clone(),
            node_factory: node_factory.clone(),
            components: Vec::new(),
            nodes: Vec::new(),
            system_parameters: SystemParameters::new(),
            aliases: AliasRegistry::default(),
            taken_names: HashMap::new(),
            stop_flag: Arc::new(AtomicBool::new(false)),
            num_log_samples: DEFAULT_NUM_LOG_SAMPLES,
            log_start_time: f64::NEG_INFINITY,
            s_order: Vec::new(),
            c_order: Vec::new(),
            q_order: Vec::new(),
            explicit_cqs: false,
            initialized: false,
            finalized: false,
            keep_start_values: false,
        }
    }

    /// The system name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.base.name()
    }

    /// The system's track entity.
    #[must_use]
    pub fn entity(&self) -> &Arc<Entity> {
        self.base.entity()
    }

    /// The tracker shared by everything inside this system.
    #[must_use]
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// The node-descriptor registry used by the connection assistant.
    #[must_use]
    pub fn node_factory(&self) -> &Arc<NodeFactory> {
        &self.node_factory
    }

    /// Set the externally-visible CQS type explicitly, disabling automatic
    /// derivation from the boundary.
    pub fn set_type_cqs(&mut self, cqs: CqsType) {
        self.base.set_cqs_type(cqs);
        self.explicit_cqs = true;
    }

    /// Derive the externally-visible CQS type from the boundary unless it
    /// was set explicitly: all boundary power connections into C components
    /// make the system C, all into Q make it Q, signal-only boundaries make
    /// it S, anything mixed leaves it undefined.
    pub fn determine_cqs_type(&mut self) {
        if self.explicit_cqs {
            return;
        }
        let own_name = self.base.name().to_owned();
        let mut saw_c = false;
        let mut saw_q = false;
        let mut saw_signal = false;
        let mut mixed = false;
        for port in self.base.ports() {
            if port.role() != PortRole::System {
                continue;
            }
            let Some(node) = port.node() else { continue };
            for port_ref in node.connected_ports() {
                if port_ref.component == own_name && port_ref.port == port.name() {
                    continue;
                }
                match port_ref.role {
                    PortRole::Power => match port_ref.cqs {
                        CqsType::C => saw_c = true,
                        CqsType::Q => saw_q = true,
                        _ => mixed = true,
                    },
                    PortRole::Read | PortRole::Write => saw_signal = true,
                    _ => {}
                }
            }
        }
        let derived = match (saw_c, saw_q, saw_signal, mixed) {
            (true, false, _, false) => CqsType::C,
            (false, true, _, false) => CqsType::Q,
            (false, false, true, false) => CqsType::S,
            _ => CqsType::Undefined,
        };
        self.base.set_cqs_type(derived);
    }

    // --- names ---

    fn find_unique_name(&self, desired: &str) -> String {
        let mut name = if desired.is_empty() {
            "noName".to_owned()
        } else {
            desired.to_owned()
        };
        let mut ctr: usize = 1;
        while self.taken_names.contains_key(&name) {
            // Strip an existing numeric suffix before retrying
            if let Some(pos) = name.rfind('_')
                && name[pos + 1..].chars().next().is_some_and(|c| c.is_ascii_digit())
            {
                name.truncate(pos);
            }
            name.push('_');
            name.push_str(&ctr.to_string());
            ctr += 1;
        }
        name
    }

    /// Reserve a name in the system's shared namespace, uniquified if
    /// needed. Returns the name actually reserved.
    pub fn reserve_unique_name(&mut self, desired: &str) -> String {
        let name = self.find_unique_name(desired);
        self.taken_names.insert(name.clone(), NameClass::Reserved);
        name
    }

    /// Release a reserved name.
    pub fn unreserve_unique_name(&mut self, name: &str) {
        if self.taken_names.get(name) == Some(&NameClass::Reserved) {
            self.taken_names.remove(name);
        }
    }

    // --- components ---

    /// Add a subcomponent, assigning it a unique name (appending a `_<k>`
    /// suffix where needed). Returns the name under which it was filed.
    pub fn add_component(&mut self, mut component: BoxedModel) -> Result<String, SimError> {
        let desired = component.base().name().to_owned();
        let name = self.find_unique_name(&desired);
        self.taken_names.insert(name.clone(), NameClass::Component);
        component.base_mut().adopt(self.base.entity(), &name);

        // Materialize start-value nodes where seeding is meaningful: power
        // ports of C components (they own the wave state) and write ports
        // (signal start values). Everything else reads its node.
        let cqs = component.base().cqs_type();
        for port in component.base_mut().ports_mut() {
            let wants_start = match port.role() {
                PortRole::Power => cqs == CqsType::C,
                PortRole::Write => true,
                _ => false,
            };
            let Some(node_type) = port.node_type().map(str::to_owned) else {
                continue;
            };
            match self.node_factory.get(&node_type) {
                Some(descriptor) => {
                    if wants_start {
                        port.create_start_node(&descriptor);
                    }
                }
                None => {
                    warn!(self.base.entity() ;
                        "Component '{name}' uses unknown node type '{node_type}'");
                }
            }
        }

        debug!(self.base.entity() ; "Added component '{name}'");
        self.components.push(component);
        Ok(name)
    }

    /// Remove a subcomponent, releasing ownership to the caller. Every port
    /// must be disconnected first.
    pub fn remove_component(&mut self, name: &str) -> Result<BoxedModel, SimError> {
        let Some(index) = self.component_index(name) else {
            return sim_error!("No component '{name}' in system '{}'", self.base.name());
        };
        if self.components[index]
            .base()
            .ports()
            .iter()
            .any(Port::is_connected)
        {
            return sim_error!("Component '{name}' is still connected");
        }
        let component = self.components.remove(index);
        self.taken_names.remove(name);
        for alias in self.aliases.component_removed(name) {
            self.taken_names.remove(&alias);
        }
        debug!(self.base.entity() ; "Removed component '{name}'");
        Ok(component)
    }

    /// Rename a subcomponent, uniquifying the new name. Aliases referencing
    /// the component are rewritten. Returns the name actually assigned.
    pub fn rename_component(&mut self, old_name: &str, new_name: &str) -> Result<String, SimError> {
        let Some(index) = self.component_index(old_name) else {
            return sim_error!("No component '{old_name}' in system '{}'", self.base.name());
        };
        self.taken_names.remove(old_name);
        let assigned = self.find_unique_name(new_name);
        self.taken_names.insert(assigned.clone(), NameClass::Component);

        // Rewrite the node back-references before the name changes
        let parent_entity = self.base.entity().clone();
        let component = &mut self.components[index];
        for port in component.base().ports() {
            for (sub_name, _, node) in port_nodes(port) {
                node.detach_port(old_name, &sub_name);
            }
        }
        component.base_mut().adopt(&parent_entity, &assigned);
        let cqs = component.base().cqs_type();
        for port in component.base().ports() {
            for (sub_name, role, node) in port_nodes(port) {
                node.attach_port(crate::node::PortRef {
                    component: assigned.clone(),
                    port: sub_name,
                    role,
                    cqs,
                });
            }
        }

        // A renamed container is also known by name to its own interior
        // nodes (through its system ports)
        if let Some(sub_system) = component.as_system_mut() {
            for node in &sub_system.nodes {
                node.rename_component_refs(old_name, &assigned);
            }
        }

        self.aliases.component_renamed(old_name, &assigned);
        debug!(self.base.entity() ; "Renamed component '{old_name}' to '{assigned}'");
        Ok(assigned)
    }

    pub(crate) fn component_index(&self, name: &str) -> Option<usize> {
        self.components.iter().position(|c| c.base().name() == name)
    }

    pub(crate) fn components(&self) -> &[BoxedModel] {
        &self.components
    }

    pub(crate) fn components_mut(&mut self) -> &mut Vec<BoxedModel> {
        &mut self.components
    }

    /// Borrow a subcomponent by name.
    #[must_use]
    pub fn sub_component(&self, name: &str) -> Option<&dyn Model> {
        self.component_index(name)
            .map(|i| self.components[i].as_ref())
    }

    /// Borrow a subcomponent by name, mutably.
    pub fn sub_component_mut(&mut self, name: &str) -> Option<&mut BoxedModel> {
        let index = self.component_index(name)?;
        Some(&mut self.components[index])
    }

    /// Borrow a sub-system by name, or `None` when the component is not a
    /// container.
    pub fn sub_system_mut(&mut self, name: &str) -> Option<&mut System> {
        self.sub_component_mut(name)?.as_system_mut()
    }

    /// Names of all subcomponents, in insertion order.
    #[must_use]
    pub fn component_names(&self) -> Vec<String> {
        self.components
            .iter()
            .map(|c| c.base().name().to_owned())
            .collect()
    }

    /// Whether the system owns no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    // --- system ports ---

    /// Add a system port exposing an interior node to the parent. The node
    /// type is adopted from whichever side connects first. Returns the name
    /// actually reserved.
    pub fn add_system_port(&mut self, name: &str) -> Result<String, SimError> {
        let unique = self.find_unique_name(name);
        self.taken_names
            .insert(unique.clone(), NameClass::SystemPort);
        self.base.add_system_port_untyped(&unique);
        Ok(unique)
    }

    /// Rename a system port; aliases referencing it are rewritten.
    pub fn rename_system_port(&mut self, old_name: &str, new_name: &str) -> Result<String, SimError> {
        let own_name = self.base.name().to_owned();
        if self.base.find_port(old_name).is_none() {
            return sim_error!("No system port '{old_name}'");
        }
        self.taken_names.remove(old_name);
        let assigned = self.find_unique_name(new_name);
        self.taken_names
            .insert(assigned.clone(), NameClass::SystemPort);
        let port = self.base.find_port_mut(old_name).unwrap();
        if let Some(node) = port.node().cloned() {
            node.detach_port(&own_name, old_name);
            node.attach_port(crate::node::PortRef {
                component: own_name.clone(),
                port: assigned.clone(),
                role: PortRole::System,
                cqs: CqsType::Undefined,
            });
        }
        port.set_name(&assigned);
        self.aliases.port_renamed(&own_name, old_name, &assigned);
        Ok(assigned)
    }

    /// Delete an unconnected system port.
    pub fn delete_system_port(&mut self, name: &str) -> SimResult {
        let own_name = self.base.name().to_owned();
        match self.base.find_port(name) {
            None => return sim_error!("No system port '{name}'"),
            Some(port) if port.is_connected() => {
                return sim_error!("System port '{name}' is still connected");
            }
            Some(_) => {}
        }
        self.base.remove_port(name);
        self.taken_names.remove(name);
        for alias in self.aliases.port_removed(&own_name, name) {
            self.taken_names.remove(&alias);
        }
        Ok(())
    }

    /// The system ports (and nothing else lives on a system's own base).
    #[must_use]
    pub fn system_ports(&self) -> &[Port] {
        self.base.ports()
    }

    // --- ports of arbitrary components ---

    /// Borrow a port: `component` may be the system's own name to reach a
    /// system port.
    pub fn port_of(&self, component: &str, port: &str) -> Result<&Port, SimError> {
        let base = if component == self.base.name() {
            &self.base
        } else {
            match self.component_index(component) {
                Some(i) => self.components[i].base(),
                None => return sim_error!("No component '{component}'"),
            }
        };
        match base.find_port(port) {
            Some(p) => Ok(p),
            None => sim_error!("Component '{component}' has no port '{port}'"),
        }
    }

    /// Borrow a port mutably; see [`port_of`](Self::port_of).
    pub fn port_of_mut(&mut self, component: &str, port: &str) -> Result<&mut Port, SimError> {
        let own = component == self.base.name();
        let index = if own { None } else { self.component_index(component) };
        let base = if own {
            &mut self.base
        } else {
            match index {
                Some(i) => self.components[i].base_mut(),
                None => return sim_error!("No component '{component}'"),
            }
        };
        match base.find_port_mut(port) {
            Some(p) => Ok(p),
            None => sim_error!("Component '{component}' has no port '{port}'"),
        }
    }

    /// Set a start value on a component port.
    pub fn set_start_value(
        &mut self,
        component: &str,
        port: &str,
        slot: usize,
        value: f64,
    ) -> SimResult {
        let port_ref = self.port_of_mut(component, port)?;
        if port_ref.set_start_value(slot, value) {
            Ok(())
        } else {
            sim_error!("Port '{component}.{port}' has no start values to set")
        }
    }

    // --- system parameters ---

    /// Add or update a system parameter from text. The prototype value
    /// supplies the declared type.
    pub fn set_system_parameter(
        &mut self,
        name: &str,
        text: &str,
        prototype: ParameterValue,
    ) -> SimResult {
        match self.taken_names.get(name) {
            None => {
                self.taken_names
                    .insert(name.to_owned(), NameClass::SystemParameter);
            }
            Some(NameClass::SystemParameter) => {}
            Some(_) => return sim_error!("Name '{name}' is already in use"),
        }
        self.system_parameters
            .set(name, text, prototype, "", "")
    }

    /// Remove a system parameter; any bindings to it dangle and fail at the
    /// next initialize.
    pub fn remove_system_parameter(&mut self, name: &str) -> SimResult {
        self.system_parameters.remove(name)?;
        self.taken_names.remove(name);
        Ok(())
    }

    /// Rename a system parameter, leaving old bindings to fail late.
    pub fn rename_system_parameter(&mut self, old_name: &str, new_name: &str) -> SimResult {
        if self.taken_names.contains_key(new_name) {
            return sim_error!("Name '{new_name}' is already in use");
        }
        self.system_parameters.rename(old_name, new_name)?;
        self.taken_names.remove(old_name);
        self.taken_names
            .insert(new_name.to_owned(), NameClass::SystemParameter);
        Ok(())
    }

    /// The system-parameter store.
    #[must_use]
    pub fn system_parameters(&self) -> &SystemParameters {
        &self.system_parameters
    }

    /// Set a component parameter from text (literal or system-parameter
    /// name).
    pub fn set_parameter_value(
        &mut self,
        component: &str,
        parameter: &str,
        text: &str,
    ) -> SimResult {
        let Some(index) = self.component_index(component) else {
            return sim_error!("No component '{component}'");
        };
        self.components[index]
            .base_mut()
            .parameters_mut()
            .set_value_text(parameter, text)
    }

    /// The textual value of a component parameter.
    pub fn parameter_value(&self, component: &str, parameter: &str) -> Result<String, SimError> {
        let Some(index) = self.component_index(component) else {
            return sim_error!("No component '{component}'");
        };
        self.components[index]
            .base()
            .parameters()
            .value_text(parameter)
    }

    /// Re-evaluate every component parameter against the system-parameter
    /// store, recursively.
    pub fn update_parameters(&mut self) -> SimResult {
        for index in 0..self.components.len() {
            let params = &self.system_parameters;
            let component = &mut self.components[index];
            let name = component.base().name().to_owned();
            component
                .base_mut()
                .parameters_mut()
                .evaluate(params)
                .map_err(|e| SimError(format!("{name}: {}", e.0)))?;
            if let Some(sub_system) = component.as_system_mut() {
                sub_system.update_parameters()?;
            }
        }
        Ok(())
    }

    // --- aliases ---

    /// Register a variable alias for `(component, port, channel)`.
    pub fn set_variable_alias(
        &mut self,
        alias: &str,
        component: &str,
        port: &str,
        data_name: &str,
    ) -> SimResult {
        if self.taken_names.contains_key(alias) {
            return sim_error!("Name '{alias}' is already in use");
        }
        self.port_of(component, port)?;
        self.taken_names.insert(alias.to_owned(), NameClass::Alias);
        self.aliases.insert(
            alias,
            AliasTarget::Variable {
                component: component.to_owned(),
                port: port.to_owned(),
                data_name: data_name.to_owned(),
            },
        );
        Ok(())
    }

    /// Register a parameter alias for `(component, parameter)`.
    pub fn set_parameter_alias(
        &mut self,
        alias: &str,
        component: &str,
        parameter: &str,
    ) -> SimResult {
        if self.taken_names.contains_key(alias) {
            return sim_error!("Name '{alias}' is already in use");
        }
        self.taken_names.insert(alias.to_owned(), NameClass::Alias);
        self.aliases.insert(
            alias,
            AliasTarget::Parameter {
                component: component.to_owned(),
                parameter: parameter.to_owned(),
            },
        );
        Ok(())
    }

    /// The textual value of a component parameter addressed by alias.
    pub fn parameter_value_by_alias(&self, alias: &str) -> Result<String, SimError> {
        match self.aliases.get(alias) {
            Some(AliasTarget::Parameter {
                component,
                parameter,
            }) => self.parameter_value(component, parameter),
            Some(AliasTarget::Variable { .. }) => {
                sim_error!("'{alias}' is a variable alias, not a parameter alias")
            }
            None => sim_error!("No alias '{alias}'"),
        }
    }

    /// Remove an alias.
    pub fn remove_alias(&mut self, alias: &str) -> SimResult {
        if !self.aliases.remove(alias) {
            return sim_error!("No alias '{alias}'");
        }
        self.taken_names.remove(alias);
        Ok(())
    }

    /// The alias table.
    #[must_use]
    pub fn aliases(&self) -> &AliasRegistry {
        &self.aliases
    }

    // --- logging configuration ---

    /// Request the number of log samples for the next run.
    pub fn set_num_log_samples(&mut self, n_samples: usize) {
        self.num_log_samples = n_samples;
    }

    /// The requested number of log samples.
    #[must_use]
    pub fn num_log_samples(&self) -> usize {
        self.num_log_samples
    }

    /// Suppress logging before the given time.
    pub fn set_log_start_time(&mut self, time: f64) {
        self.log_start_time = time;
    }

    /// Enable or disable sample collection on every node in the tree.
    pub fn set_all_nodes_do_log_data(&mut self, log_or_not: bool) {
        for node in &self.nodes {
            if log_or_not {
                node.enable_log();
            } else {
                node.disable_log();
            }
        }
        for component in &mut self.components {
            if let Some(sub_system) = component.as_system_mut() {
                sub_system.set_all_nodes_do_log_data(log_or_not);
            }
        }
    }

    /// The interior nodes owned by this system.
    #[must_use]
    pub fn sub_nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    // --- start values ---

    /// Keep the node values from the previous run instead of reloading
    /// start values at the next initialize.
    pub fn set_keep_start_values(&mut self, keep: bool) {
        self.keep_start_values = keep;
    }

    /// Copy every port's start values into its backing node and apply the
    /// node types' wave projections, recursively.
    pub fn load_start_values(&mut self) {
        for component in &mut self.components {
            if let Some(sub_system) = component.as_system_mut() {
                sub_system.load_start_values();
            } else {
                for port in component.base().ports() {
                    port.load_start_values();
                }
            }
        }
    }

    /// Copy the last simulated node values back into the start nodes,
    /// recursively, so the next run continues from this one's end state.
    pub fn load_start_values_from_simulation(&mut self) {
        for component in &mut self.components {
            if let Some(sub_system) = component.as_system_mut() {
                sub_system.load_start_values_from_simulation();
            } else {
                for port in component.base().ports() {
                    port.load_start_values_from_simulation();
                }
            }
        }
    }

    // --- lifecycle ---

    /// Request a timestep for this system (propagates to children at the
    /// next initialize).
    pub fn set_desired_timestep(&mut self, timestep: f64) {
        self.base.set_desired_timestep(timestep);
    }

    /// The effective timestep.
    #[must_use]
    pub fn timestep(&self) -> f64 {
        self.base.timestep()
    }

    /// Current simulation time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.base.time()
    }

    /// Whether the last `initialize` succeeded and no simulation has been
    /// finalized since.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// A cloneable handle that cancels the simulation from another thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_flag.clone()
    }

    /// Request cooperative cancellation; observed at the top of every outer
    /// loop iteration and at each phase barrier.
    pub fn stop_simulation(&self) {
        self.stop_flag.store(true, Relaxed);
    }

    /// Prepare the tree for a run over `[start_t, stop_t]`: adjust child
    /// timesteps, pre-allocate node log space, load start values, then
    /// initialize every component in S, C, Q order (recursing into
    /// sub-systems). On failure an Error message is emitted and `simulate`
    /// refuses to run.
    pub fn initialize(&mut self, start_t: f64, stop_t: f64) -> SimResult {
        self.stop_flag.store(false, Relaxed);
        let result = self.initialize_impl(start_t, stop_t);
        match &result {
            Ok(()) => {
                self.initialized = true;
            }
            Err(e) => {
                self.initialized = false;
                error!(self.base.entity() ; "{e}");
            }
        }
        result
    }

    /// Initialize with an explicit log sample count (see
    /// [`set_num_log_samples`](Self::set_num_log_samples)).
    pub fn initialize_with_samples(
        &mut self,
        start_t: f64,
        stop_t: f64,
        n_samples: usize,
    ) -> SimResult {
        self.set_num_log_samples(n_samples);
        self.initialize(start_t, stop_t)
    }

    fn initialize_impl(&mut self, start_t: f64, stop_t: f64) -> SimResult {
        self.finalized = false;
        self.base.set_time(start_t);
        self.adjust_timesteps();
        self.rebuild_schedule()?;
        self.setup_node_logging(start_t, stop_t);
        if !self.keep_start_values {
            self.load_start_values();
        }

        let order: Vec<usize> = self
            .s_order
            .iter()
            .chain(self.c_order.iter())
            .chain(self.q_order.iter())
            .copied()
            .collect();
        let stop_flag = self.stop_flag.clone();
        for index in order {
            let system_parameters = &self.system_parameters;
            let component = &mut self.components[index];
            let name = component.base().name().to_owned();

            if let Err(failing) = component
                .base()
                .parameters()
                .check_parameters(system_parameters)
            {
                return sim_error!("Parameter '{failing}' of component '{name}' does not evaluate");
            }
            component
                .base_mut()
                .parameters_mut()
                .evaluate(system_parameters)?;
            component.base().check_required_connections()?;

            component.base_mut().set_time(start_t);
            match component.as_system_mut() {
                Some(sub_system) => {
                    sub_system.stop_flag = stop_flag.clone();
                    sub_system.initialize_impl(start_t, stop_t)?;
                    sub_system.initialized = true;
                }
                None => {
                    if let Err(e) = component.initialize() {
                        return sim_error!("Component '{name}' failed to initialize: {}", e.0);
                    }
                }
            }
        }
        Ok(())
    }

    fn adjust_timesteps(&mut self) {
        let system_ts = self.base.timestep();
        for component in &mut self.components {
            let base = component.base_mut();
            let ts = if base.inherits_timestep() {
                system_ts
            } else {
                let desired = base.desired_timestep();
                if desired > system_ts || desired <= 0.0 {
                    system_ts
                } else {
                    // Snap to the largest divisor of the system step that
                    // is <= the desired step
                    system_ts / (system_ts / desired + 0.5).floor()
                }
            };
            base.set_timestep(ts);
        }
    }

    fn rebuild_schedule(&mut self) -> SimResult {
        self.s_order.clear();
        self.c_order.clear();
        self.q_order.clear();
        for (index, component) in self.components.iter().enumerate() {
            match component.base().cqs_type() {
                CqsType::S => self.s_order.push(index),
                CqsType::C => self.c_order.push(index),
                CqsType::Q => self.q_order.push(index),
                CqsType::Undefined => {
                    return sim_error!(
                        "Component '{}' has no CQS type; set one before initializing",
                        component.base().name()
                    );
                }
            }
        }
        Ok(())
    }

    fn setup_node_logging(&mut self, start_t: f64, stop_t: f64) {
        let ts = self.base.timestep();
        let log_start = self.log_start_time.max(start_t);
        let mut warned = false;
        for node in &self.nodes {
            let clamped =
                node.set_log_settings_num_samples(self.num_log_samples, log_start, stop_t, ts);
            if clamped < self.num_log_samples && !warned {
                warn!(self.base.entity() ;
                    "Requested {} log samples, more than the simulation will produce; limiting to {clamped}",
                    self.num_log_samples);
                warned = true;
            }
            node.pre_allocate_log_space();
        }
    }

    /// Log every interior node of this system at `time`, guarded by each
    /// node's own schedule.
    pub fn log_all_nodes(&self, time: f64) {
        for node in &self.nodes {
            node.log(time);
        }
    }

    pub(crate) fn log_all_nodes_recursive(&self, time: f64) {
        self.log_all_nodes(time);
        for component in &self.components {
            if let Some(sub_system) = component.as_system() {
                sub_system.log_all_nodes_recursive(time);
            }
        }
    }

    fn run_phases(&mut self, t: f64, ts: f64) {
        for i in 0..self.s_order.len() {
            let index = self.s_order[i];
            self.components[index].simulate(t, t + ts);
        }
        for i in 0..self.c_order.len() {
            let index = self.c_order[i];
            self.components[index].simulate(t, t + ts);
        }
        for i in 0..self.q_order.len() {
            let index = self.q_order[i];
            self.components[index].simulate(t, t + ts);
        }
    }

    pub(crate) fn step_over(&mut self, start_t: f64, stop_t: f64) {
        let ts = self.base.timestep();
        let stop_safe = stop_t - ts / 2.0;
        self.base.set_time(start_t);
        let mut t = start_t;
        while t < stop_safe {
            if self.stop_flag.load(Relaxed) {
                break;
            }
            self.log_all_nodes(t);
            self.run_phases(t, ts);
            t += ts;
            self.base.set_time(t);
        }
    }

    /// Drive the fixed-step outer loop from the current time to `stop_t`.
    ///
    /// Each iteration logs the interior nodes, then executes the S, C and Q
    /// groups in that order. On completion one final sample is taken so the
    /// log covers `[start, stop]` inclusively. On cancellation every
    /// component is finalized exactly once and `Canceled` is returned.
    pub fn simulate(&mut self, stop_t: f64) -> SimOutcome {
        if !self.initialized {
            error!(self.base.entity() ; "simulate called before a successful initialize");
            return SimOutcome::NotReady;
        }
        let ts = self.base.timestep();
        let stop_safe = stop_t - ts / 2.0;
        let mut t = self.base.time();
        let mut canceled = false;
        while t < stop_safe {
            if self.stop_flag.load(Relaxed) {
                canceled = true;
                break;
            }
            set_time!(self.base.entity() ; t);
            self.log_all_nodes(t);
            self.run_phases(t, ts);
            t += ts;
            self.base.set_time(t);
        }
        if canceled {
            info!(self.base.entity() ; "Simulation canceled at t = {t:.9}");
            self.finalize();
            return SimOutcome::Canceled;
        }
        self.log_all_nodes_recursive(t);
        SimOutcome::Finished
    }

    /// Finalize every component (recursively), exactly once per run.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        for component in &mut self.components {
            component.finalize();
        }
        self.finalized = true;
        self.initialized = false;
    }

    // --- introspection ---

    fn resolve_variable<'a>(
        &'a self,
        port_path: &str,
        channel: &str,
    ) -> Result<(&'a Port, String), SimError> {
        if let Some(AliasTarget::Variable {
            component,
            port,
            data_name,
        }) = self.aliases.get(port_path)
        {
            let chosen = if channel.is_empty() { data_name.clone() } else { channel.to_owned() };
            return Ok((self.port_of(component, port)?, chosen));
        }
        let parts: Vec<&str> = port_path.split('.').collect();
        match parts.as_slice() {
            [component, port] => Ok((self.port_of(component, port)?, channel.to_owned())),
            [sub_system, rest @ ..] => {
                let index = self
                    .component_index(sub_system)
                    .ok_or_else(|| SimError(format!("No component '{sub_system}'")))?;
                match self.components[index].as_system() {
                    Some(sub) => sub.resolve_variable(&rest.join("."), channel),
                    None => sim_error!("'{sub_system}' is not a sub-system"),
                }
            }
            _ => sim_error!("Cannot parse port path '{port_path}'"),
        }
    }

    /// The logged sample times of the node behind `port_path`
    /// (`component.port`, `subsystem.component.port`, or a variable alias).
    pub fn time_vector(&self, port_path: &str) -> Result<Vec<f64>, SimError> {
        let (port, _) = self.resolve_variable(port_path, "")?;
        match port.node() {
            Some(node) => Ok(node.time_vector()),
            None => sim_error!("Port '{port_path}' is not connected"),
        }
    }

    /// The logged values of one channel behind `port_path`.
    pub fn log_data(&self, port_path: &str, channel: &str) -> Result<Vec<f64>, SimError> {
        let (port, chosen) = self.resolve_variable(port_path, channel)?;
        let Some(node) = port.node() else {
            return sim_error!("Port '{port_path}' is not connected");
        };
        match node.data_id(&chosen) {
            Some(slot) => Ok(node.log_data(slot)),
            None => sim_error!("Node behind '{port_path}' has no channel '{chosen}'"),
        }
    }

    /// The current value of one channel behind `port_path`.
    pub fn last_value(&self, port_path: &str, channel: &str) -> Result<f64, SimError> {
        let (port, chosen) = self.resolve_variable(port_path, channel)?;
        match port.data_id(&chosen) {
            Some(slot) => Ok(port.read_node(slot)),
            None => sim_error!("Port '{port_path}' has no channel '{chosen}'"),
        }
    }

    // --- consistency ---

    pub(crate) fn resolve_port_ref(&self, port_ref: &crate::node::PortRef) -> Option<&Port> {
        let base = if port_ref.component == self.base.name() {
            &self.base
        } else {
            self.components[self.component_index(&port_ref.component)?].base()
        };
        // Sub-port names carry their parent's name plus a '#' suffix
        match port_ref.port.split_once('#') {
            Some((parent, _)) => base
                .find_port(parent)?
                .sub_ports()
                .iter()
                .find(|p| p.name() == port_ref.port),
            None => base.find_port(&port_ref.port),
        }
    }

    /// Verify the node/port cross-references, bucket membership and log
    /// buffer shapes of this system and every sub-system.
    pub fn check_invariants(&self) -> SimResult {
        let own_name = self.base.name().to_owned();
        // Every connected port's node knows the port
        for (holder, base) in std::iter::once((own_name.clone(), &self.base)).chain(
            self.components
                .iter()
                .map(|c| (c.base().name().to_owned(), c.base())),
        ) {
            for port in base.ports() {
                for (port_name, _, node) in port_nodes(port) {
                    if !node.is_connected_to(&holder, &port_name) {
                        return sim_error!(
                            "Node behind '{holder}.{port_name}' does not list the port"
                        );
                    }
                }
            }
        }
        // Every node's registered port resolves back to this node. Ports
        // attached from outside a system port are owned by the parent scope
        // and cannot be resolved here; they are checked from that side.
        for node in &self.nodes {
            for port_ref in node.connected_ports() {
                let Some(port) = self.resolve_port_ref(&port_ref) else {
                    continue;
                };
                match port.node() {
                    Some(backing) if Arc::ptr_eq(backing, node) => {}
                    _ => {
                        return sim_error!(
                            "Port '{}.{}' does not point back at its node",
                            port_ref.component,
                            port_ref.port
                        );
                    }
                }
                if port.node_type() != Some(node.type_name()) {
                    return sim_error!(
                        "Port '{}.{}' type does not match its node",
                        port_ref.component,
                        port_ref.port
                    );
                }
            }
            let times = node.time_vector();
            if times.len() != node.num_log_slots() && node.num_log_slots() != 0 {
                // Buffers may legitimately be unallocated before initialize
                if !times.is_empty() {
                    return sim_error!("Node log buffers have inconsistent shapes");
                }
            }
        }
        for component in &self.components {
            if let Some(sub_system) = component.as_system() {
                sub_system.check_invariants()?;
            }
        }
        Ok(())
    }
}

/// The `(name, role, node)` triples of every connected plain port or
/// sub-port of a port; sub-ports carry their own effective role.
pub(crate) fn port_nodes(port: &Port) -> Vec<(String, PortRole, Arc<Node>)> {
    if port.role().is_multi() {
        port.sub_ports()
            .iter()
            .filter_map(|sub| {
                sub.node()
                    .map(|node| (sub.name().to_owned(), sub.role(), node.clone()))
            })
            .collect()
    } else {
        port.node()
            .map(|node| vec![(port.name().to_owned(), port.role(), node.clone())])
            .unwrap_or_default()
    }
}

impl Model for System {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        // Containers are initialized with time bounds by their parent
        sim_error!("System '{}' must be initialized with time bounds", self.base.name())
    }

    fn simulate_one_timestep(&mut self) {
        let t = self.base.time();
        let ts = self.base.timestep();
        self.log_all_nodes(t);
        self.run_phases(t, ts);
    }

    fn finalize(&mut self) {
        System::finalize(self);
    }

    fn simulate(&mut self, start_t: f64, stop_t: f64) {
        self.step_over(start_t, stop_t);
    }

    fn as_system(&self) -> Option<&System> {
        Some(self)
    }

    fn as_system_mut(&mut self) -> Option<&mut System> {
        Some(self)
    }
}
