// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! The connection assistant.
//!
//! `connect` and `disconnect` are the only operations that mutate node
//! membership, so this module is responsible for keeping the two directions
//! of the port/node relation consistent. Connecting two ports:
//!
//!  1. rejects mismatched node types (a bare system port adopts the other
//!     side's type),
//!  2. routes multi-ports through a freshly allocated sub-port (allocated
//!     only once every check has passed, so failures leave no stray
//!     sub-ports behind),
//!  3. counts the ports that would share the resulting node and rejects
//!     anything physically illegal: more than two power ports, more than
//!     one write port, a write port next to power ports, a node with only
//!     readers, or two power ports both belonging to C-type (or both to
//!     Q-type) components,
//!  4. creates a fresh node, attaches to the existing one, or merges two
//!     existing nodes, registering new nodes in the connecting system.
//!
//! Disconnect detaches the named pair; a node left with fewer than two
//! non-read ports is destroyed and surviving read ports fall back to their
//! start values. Connecting two ports that already share a node is a no-op
//! success, so redundant calls are harmless.
//!
//! Both endpoints must be visible from the connecting system: its own
//! system ports, its direct children's ports, or the system ports of child
//! containers. Anything else fails to resolve, which is what rejects
//! cross-system connections without a shared boundary.

use std::sync::Arc;

use flume_track::{debug, error};

use crate::node::{Node, PortRef};
use crate::port::Port;
use crate::sim_error;
use crate::system::{System, port_nodes};
use crate::types::{CqsType, PortRole, SimError, SimResult};

/// Which port container an endpoint lives in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Owner {
    /// The connecting system's own system ports.
    SelfPorts,
    /// A subcomponent, by index.
    Component(usize),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Loc {
    owner: Owner,
    port_index: usize,
}

/// Facts about an endpoint gathered before any mutation.
struct Endpoint {
    loc: Loc,
    owner_name: String,
    owner_cqs: CqsType,
    port_name: String,
    role: PortRole,
    node_type: Option<String>,
    node: Option<Arc<Node>>,
}

impl Endpoint {
    fn effective_role(&self) -> PortRole {
        self.role.sub_role()
    }

    fn path(&self) -> String {
        format!("{}.{}", self.owner_name, self.port_name)
    }
}

impl System {
    fn resolve_loc(&self, component: &str, port: &str) -> Result<Loc, SimError> {
        let (owner, base) = if component == self.name() {
            (Owner::SelfPorts, self.base_ref())
        } else {
            match self.component_index(component) {
                Some(index) => (Owner::Component(index), self.components()[index].base()),
                None => {
                    return sim_error!(
                        "No component '{component}' in system '{}'",
                        self.name()
                    );
                }
            }
        };
        match base.port_index(port) {
            Some(port_index) => Ok(Loc { owner, port_index }),
            None => sim_error!("Component '{component}' has no port '{port}'"),
        }
    }

    fn base_ref(&self) -> &crate::component::ComponentBase {
        crate::component::Model::base(self)
    }

    fn port_at_loc(&self, loc: Loc) -> &Port {
        match loc.owner {
            Owner::SelfPorts => self.base_ref().port_at(loc.port_index),
            Owner::Component(index) => self.components()[index].base().port_at(loc.port_index),
        }
    }

    fn port_at_loc_mut(&mut self, loc: Loc) -> &mut Port {
        match loc.owner {
            Owner::SelfPorts => {
                crate::component::Model::base_mut(self).port_at_mut(loc.port_index)
            }
            Owner::Component(index) => {
                self.components_mut()[index].base_mut().port_at_mut(loc.port_index)
            }
        }
    }

    fn endpoint(&self, loc: Loc) -> Endpoint {
        let (owner_name, owner_cqs) = match loc.owner {
            Owner::SelfPorts => (self.name().to_owned(), self.base_ref().cqs_type()),
            Owner::Component(index) => {
                let base = self.components()[index].base();
                (base.name().to_owned(), base.cqs_type())
            }
        };
        let port = self.port_at_loc(loc);
        Endpoint {
            loc,
            owner_name,
            owner_cqs,
            port_name: port.name().to_owned(),
            role: port.role(),
            node_type: port.node_type().map(str::to_owned),
            node: port.node().cloned(),
        }
    }

    /// Whether the two endpoints already share a node (through sub-ports
    /// where multi-ports are involved).
    fn already_co_nodal(&self, a: &Endpoint, b: &Endpoint) -> bool {
        let a_port = self.port_at_loc(a.loc);
        let b_port = self.port_at_loc(b.loc);
        let a_nodes = port_nodes(a_port);
        let b_nodes = port_nodes(b_port);
        a_nodes
            .iter()
            .any(|(_, _, an)| b_nodes.iter().any(|(_, _, bn)| Arc::ptr_eq(an, bn)))
    }

    /// Check the legality of every port that would share `node_refs`.
    fn ensure_connection_ok(
        &self,
        existing: &[PortRef],
        incoming: &[&Endpoint],
    ) -> SimResult {
        let mut num_read = 0;
        let mut num_write = 0;
        let mut num_power = 0;
        let mut num_system = 0;
        let mut num_power_c = 0;
        let mut num_power_q = 0;

        let mut count = |role: PortRole, cqs: CqsType| match role {
            PortRole::Read => num_read += 1,
            PortRole::Write => num_write += 1,
            PortRole::Power => {
                num_power += 1;
                match cqs {
                    CqsType::C => num_power_c += 1,
                    CqsType::Q => num_power_q += 1,
                    _ => {}
                }
            }
            PortRole::System => num_system += 1,
            // Multi-ports contribute through their sub-ports
            PortRole::PowerMulti | PortRole::ReadMulti => {}
        };

        for port_ref in existing {
            count(port_ref.role, port_ref.cqs);
        }
        for endpoint in incoming {
            count(endpoint.effective_role(), endpoint.owner_cqs);
        }

        if num_power > 2 {
            return sim_error!("Trying to connect more than two power ports to the same node");
        }
        if num_write > 1 {
            return sim_error!("Trying to connect more than one write port to the same node");
        }
        if num_power > 0 && num_write > 0 {
            return sim_error!("Trying to connect a write port and a power port to the same node");
        }
        if num_power == 0 && num_write == 0 && num_system == 0 && num_read > 0 {
            return sim_error!("Trying to connect only read ports; the node has no source");
        }
        if num_power_c > 1 {
            return sim_error!("Both power ports belong to C-type components");
        }
        if num_power_q > 1 {
            return sim_error!("Both power ports belong to Q-type components");
        }
        Ok(())
    }

    /// Connect two ports identified by `(component, port)` names. The
    /// system's own name addresses its system ports.
    pub fn connect(
        &mut self,
        component1: &str,
        port1: &str,
        component2: &str,
        port2: &str,
    ) -> SimResult {
        let result = self.connect_impl(component1, port1, component2, port2);
        if let Err(e) = &result {
            error!(self.entity() ;
                "Could not connect '{component1}.{port1}' with '{component2}.{port2}': {}", e.0);
        }
        result
    }

    fn connect_impl(
        &mut self,
        component1: &str,
        port1: &str,
        component2: &str,
        port2: &str,
    ) -> SimResult {
        let loc1 = self.resolve_loc(component1, port1)?;
        let loc2 = self.resolve_loc(component2, port2)?;
        if loc1 == loc2 {
            return sim_error!("Cannot connect a port to itself");
        }
        let end1 = self.endpoint(loc1);
        let end2 = self.endpoint(loc2);

        // Redundant connects are a no-op success
        if self.already_co_nodal(&end1, &end2) {
            return Ok(());
        }

        // Node types must agree; a bare system port adopts the peer's type
        let shared_type = match (&end1.node_type, &end2.node_type) {
            (Some(t1), Some(t2)) if t1 != t2 => {
                return sim_error!(
                    "Node type mismatch: '{}' is {t1} but '{}' is {t2}",
                    end1.path(),
                    end2.path()
                );
            }
            (Some(t), _) | (_, Some(t)) => t.clone(),
            (None, None) => {
                return sim_error!(
                    "Cannot connect '{}' with '{}': neither port has a node type yet",
                    end1.path(),
                    end2.path()
                );
            }
        };
        let Some(descriptor) = self.node_factory().get(&shared_type) else {
            return sim_error!("Unknown node type '{shared_type}'");
        };

        // Legality against the ports that would share the resulting node
        let mut existing: Vec<PortRef> = Vec::new();
        for node in [&end1.node, &end2.node].into_iter().flatten() {
            existing.extend(node.connected_ports());
        }
        let incoming: Vec<&Endpoint> = [&end1, &end2]
            .into_iter()
            .filter(|e| e.node.is_none())
            .collect();
        self.ensure_connection_ok(&existing, &incoming)?;

        // A merge of two existing nodes must stay within this system
        if let (Some(n1), Some(n2)) = (&end1.node, &end2.node) {
            let owns = |node: &Arc<Node>| self.nodes.iter().any(|n| Arc::ptr_eq(n, node));
            if !owns(n1) || !owns(n2) {
                return sim_error!(
                    "Cannot merge nodes across a system boundary; disconnect the boundary port first"
                );
            }
        }

        // All checks passed; mutate
        match (&end1.node, &end2.node) {
            (None, None) => {
                let node = Node::new(&descriptor);
                self.attach(&end1, &node, &shared_type);
                self.attach(&end2, &node, &shared_type);
                self.nodes.push(node);
            }
            (Some(node), None) => {
                let node = node.clone();
                self.attach(&end2, &node, &shared_type);
            }
            (None, Some(node)) => {
                let node = node.clone();
                self.attach(&end1, &node, &shared_type);
            }
            (Some(node1), Some(node2)) => {
                let (keep, drop) = (node1.clone(), node2.clone());
                self.merge_nodes(&keep, &drop)?;
            }
        }

        self.refresh_boundary_cqs(&end1, &end2);
        debug!(self.entity() ;
            "Connected '{}' with '{}'", end1.path(), end2.path());
        Ok(())
    }

    /// Re-derive the CQS type of any container whose boundary changed: this
    /// system when its own ports were involved, a child system when one of
    /// its system ports was.
    fn refresh_boundary_cqs(&mut self, end1: &Endpoint, end2: &Endpoint) {
        let mut own_boundary = false;
        for endpoint in [end1, end2] {
            match endpoint.loc.owner {
                Owner::SelfPorts => own_boundary = true,
                Owner::Component(index) => {
                    if endpoint.role == PortRole::System
                        && let Some(sub_system) = self.components_mut()[index].as_system_mut()
                    {
                        sub_system.determine_cqs_type();
                    }
                }
            }
        }
        if own_boundary {
            self.determine_cqs_type();
        }
    }

    /// Bind one endpoint to `node`, allocating a sub-port for multi-ports
    /// and adopting the node type on bare system ports.
    fn attach(&mut self, endpoint: &Endpoint, node: &Arc<Node>, shared_type: &str) {
        let owner_name = endpoint.owner_name.clone();
        let owner_cqs = endpoint.owner_cqs;
        let port = self.port_at_loc_mut(endpoint.loc);
        if port.node_type().is_none() {
            port.set_node_type(Some(shared_type.to_owned()));
        }
        let (bound_name, bound_role) = if port.role().is_multi() {
            let sub = port.add_sub_port();
            sub.set_node(node.clone());
            (sub.name().to_owned(), sub.role())
        } else {
            port.set_node(node.clone());
            (port.name().to_owned(), port.role())
        };
        node.attach_port(PortRef {
            component: owner_name,
            port: bound_name,
            role: bound_role,
            cqs: owner_cqs,
        });
    }

    /// Move every port of `drop` onto `keep`, then delete the emptied node.
    fn merge_nodes(&mut self, keep: &Arc<Node>, drop: &Arc<Node>) -> SimResult {
        let moving = drop.connected_ports();
        // Validate everything before touching anything
        for port_ref in &moving {
            if self.resolve_port_ref(port_ref).is_none() {
                return sim_error!(
                    "Cannot merge: port '{}.{}' is not visible from system '{}'",
                    port_ref.component,
                    port_ref.port,
                    self.name()
                );
            }
        }
        for port_ref in moving {
            self.repoint_port(&port_ref, keep);
            keep.attach_port(port_ref);
        }
        self.nodes.retain(|n| !Arc::ptr_eq(n, drop));
        Ok(())
    }

    fn repoint_port(&mut self, port_ref: &PortRef, node: &Arc<Node>) {
        let loc = match self.resolve_loc(&port_ref.component, parent_port_name(&port_ref.port)) {
            Ok(loc) => loc,
            Err(_) => return,
        };
        let port = self.port_at_loc_mut(loc);
        if port.role().is_multi() {
            if let Some(sub) = port.sub_port_mut(&port_ref.port) {
                sub.set_node(node.clone());
            }
        } else {
            port.set_node(node.clone());
        }
    }

    /// Disconnect two previously connected ports.
    pub fn disconnect(
        &mut self,
        component1: &str,
        port1: &str,
        component2: &str,
        port2: &str,
    ) -> SimResult {
        let result = self.disconnect_impl(component1, port1, component2, port2);
        if let Err(e) = &result {
            error!(self.entity() ;
                "Could not disconnect '{component1}.{port1}' from '{component2}.{port2}': {}", e.0);
        }
        result
    }

    fn disconnect_impl(
        &mut self,
        component1: &str,
        port1: &str,
        component2: &str,
        port2: &str,
    ) -> SimResult {
        let loc1 = self.resolve_loc(component1, port1)?;
        let loc2 = self.resolve_loc(component2, port2)?;
        let end1 = self.endpoint(loc1);
        let end2 = self.endpoint(loc2);

        // Find the node the two endpoints share, together with the names
        // under which each side is bound to it (the sub-port name where a
        // multi-port is involved)
        let nodes1 = port_nodes(self.port_at_loc(loc1));
        let nodes2 = port_nodes(self.port_at_loc(loc2));
        let mut shared = None;
        for (name1, _, node1) in &nodes1 {
            for (name2, _, node2) in &nodes2 {
                if Arc::ptr_eq(node1, node2) {
                    shared = Some((name1.clone(), name2.clone(), node1.clone()));
                }
            }
        }
        let Some((bound1, bound2, node)) = shared else {
            return sim_error!(
                "'{}' and '{}' are not connected to each other",
                end1.path(),
                end2.path()
            );
        };

        self.detach(&end1, &bound1, &node);
        self.detach(&end2, &bound2, &node);

        // A node with fewer than two non-read ports left cannot carry a
        // solution; destroy it and let surviving readers fall back to
        // their start values
        let remaining = node.connected_ports();
        let non_read = remaining
            .iter()
            .filter(|r| r.role != PortRole::Read)
            .count();
        if non_read < 2 {
            for port_ref in &remaining {
                if let Ok(loc) =
                    self.resolve_loc(&port_ref.component, parent_port_name(&port_ref.port))
                {
                    let port = self.port_at_loc_mut(loc);
                    if port.role().is_multi() {
                        port.remove_sub_port(&port_ref.port);
                    } else {
                        port.clear_node();
                    }
                }
                node.detach_port(&port_ref.component, &port_ref.port);
            }
            self.nodes.retain(|n| !Arc::ptr_eq(n, &node));
        }

        // A system port left without connections forgets its adopted type
        for endpoint in [&end1, &end2] {
            if endpoint.role == PortRole::System {
                let port = self.port_at_loc_mut(endpoint.loc);
                if !port.is_connected() {
                    port.set_node_type(None);
                }
            }
        }
        self.refresh_boundary_cqs(&end1, &end2);
        debug!(self.entity() ;
            "Disconnected '{}' from '{}'", end1.path(), end2.path());
        Ok(())
    }

    fn detach(&mut self, endpoint: &Endpoint, bound_name: &str, node: &Arc<Node>) {
        let owner_name = endpoint.owner_name.clone();
        let port = self.port_at_loc_mut(endpoint.loc);
        if port.role().is_multi() {
            port.remove_sub_port(bound_name);
        } else {
            port.clear_node();
        }
        node.detach_port(&owner_name, bound_name);
    }
}

/// Sub-port names carry their parent's name plus a `#` suffix.
fn parent_port_name(port_name: &str) -> &str {
    match port_name.split_once('#') {
        Some((parent, _)) => parent,
        None => port_name,
    }
}
