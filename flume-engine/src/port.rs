// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! Ports: a component's view onto a node.
//!
//! A port is typed by role (power / read / write / system / multi) and by the
//! node type it accepts. While connected it holds the backing
//! [`Node`](crate::node::Node); the node's reverse membership is maintained
//! by the connection assistant, which is the only code that mutates either
//! direction.
//!
//! A multi-port owns a dynamic list of sub-ports, one per external
//! connection; the multi-port itself is never the one bound to a node.
//!
//! A port may carry a detached *start-value node* of its node type. It seeds
//! the backing node at `load_start_values` time, and also serves reads while
//! the port is disconnected, so an unconnected read port sees its defaults
//! instead of poison.

use std::sync::Arc;

use crate::node::{Node, NodeDescriptor};
use crate::types::PortRole;

/// A component's access point to a node.
pub struct Port {
    name: String,
    role: PortRole,
    node_type: Option<String>,
    node: Option<Arc<Node>>,
    start_node: Option<Arc<Node>>,
    required: bool,
    sub_ports: Vec<Port>,
    /// Monotonic counter naming sub-ports, so names stay stable when
    /// earlier sub-ports are removed.
    next_sub_id: usize,
}

impl Port {
    pub(crate) fn new(name: &str, role: PortRole, node_type: Option<String>, required: bool) -> Self {
        Self {
            name: name.to_owned(),
            role,
            node_type,
            node: None,
            start_node: None,
            required,
            sub_ports: Vec::new(),
            next_sub_id: 0,
        }
    }

    /// The port name, unique within its component.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_owned();
    }

    /// The role of this port.
    #[must_use]
    pub fn role(&self) -> PortRole {
        self.role
    }

    /// The node type this port accepts, if set. Bare system ports have no
    /// preset type; they adopt the type of whatever connects first.
    #[must_use]
    pub fn node_type(&self) -> Option<&str> {
        self.node_type.as_deref()
    }

    pub(crate) fn set_node_type(&mut self, node_type: Option<String>) {
        self.node_type = node_type;
    }

    /// Whether the owning system refuses to initialize while this port is
    /// unconnected.
    #[must_use]
    pub fn is_connection_required(&self) -> bool {
        self.required
    }

    /// Whether the port is currently connected. A multi-port counts as
    /// connected when it has at least one sub-port.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        if self.role.is_multi() {
            !self.sub_ports.is_empty()
        } else {
            self.node.is_some()
        }
    }

    /// The backing node, while connected.
    #[must_use]
    pub fn node(&self) -> Option<&Arc<Node>> {
        self.node.as_ref()
    }

    pub(crate) fn set_node(&mut self, node: Arc<Node>) {
        self.node = Some(node);
    }

    pub(crate) fn clear_node(&mut self) {
        self.node = None;
    }

    // --- channel access ---

    /// Read a channel of the backing node.
    ///
    /// While disconnected, reads serve the start-value node (or zero when
    /// none exists), which plays the role of a not-connected dummy node.
    #[must_use]
    pub fn read_node(&self, slot: usize) -> f64 {
        match &self.node {
            Some(node) => node.value(slot),
            None => self.start_node.as_ref().map_or(0.0, |n| n.value(slot)),
        }
    }

    /// Write a channel of the backing node. Writes while disconnected are
    /// dropped.
    pub fn write_node(&self, slot: usize, value: f64) {
        if let Some(node) = &self.node {
            node.set_value(slot, value);
        }
    }

    /// Read a channel through sub-port `idx` of a multi-port.
    #[must_use]
    pub fn read_sub(&self, idx: usize, slot: usize) -> f64 {
        self.sub_ports[idx].read_node(slot)
    }

    /// Write a channel through sub-port `idx` of a multi-port.
    pub fn write_sub(&self, idx: usize, slot: usize, value: f64) {
        self.sub_ports[idx].write_node(slot, value);
    }

    /// Number of connection slots: 1 for plain ports, the sub-port count
    /// for multi-ports.
    #[must_use]
    pub fn num_ports(&self) -> usize {
        if self.role.is_multi() {
            self.sub_ports.len()
        } else {
            1
        }
    }

    // --- sub-ports ---

    /// Allocate a sub-port of this multi-port's node type.
    pub(crate) fn add_sub_port(&mut self) -> &mut Port {
        debug_assert!(self.role.is_multi());
        let name = format!("{}#{}", self.name, self.next_sub_id);
        self.next_sub_id += 1;
        self.sub_ports.push(Port::new(
            &name,
            self.role.sub_role(),
            self.node_type.clone(),
            false,
        ));
        self.sub_ports.last_mut().unwrap()
    }

    pub(crate) fn remove_sub_port(&mut self, name: &str) {
        self.sub_ports.retain(|p| p.name != name);
    }

    /// The sub-ports of a multi-port, in connection order.
    #[must_use]
    pub fn sub_ports(&self) -> &[Port] {
        &self.sub_ports
    }

    pub(crate) fn sub_port_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.sub_ports.iter_mut().find(|p| p.name == name)
    }

    // --- start values ---

    pub(crate) fn create_start_node(&mut self, descriptor: &Arc<NodeDescriptor>) {
        if self.start_node.is_none() {
            self.start_node = Some(Node::new(descriptor));
        }
    }

    /// The detached start-value node, if this port carries one.
    #[must_use]
    pub fn start_node(&self) -> Option<&Arc<Node>> {
        self.start_node.as_ref()
    }

    /// Set one start value. Ignored on ports without a start node
    /// (system ports and multi-ports).
    pub fn set_start_value(&self, slot: usize, value: f64) -> bool {
        match &self.start_node {
            Some(node) => {
                node.set_value(slot, value);
                true
            }
            None => false,
        }
    }

    /// One start value, or zero when the port has no start node.
    #[must_use]
    pub fn start_value(&self, slot: usize) -> f64 {
        self.start_node.as_ref().map_or(0.0, |n| n.value(slot))
    }

    /// Copy the start values into the backing node and apply the node
    /// type's wave projections.
    pub fn load_start_values(&self) {
        if let (Some(node), Some(start)) = (&self.node, &self.start_node) {
            start.copy_values_to(node);
            node.project_start_values();
        }
    }

    /// Copy the backing node's last simulated values back into the start
    /// node, so the next run continues from where this one stopped.
    pub fn load_start_values_from_simulation(&self) {
        if let (Some(node), Some(start)) = (&self.node, &self.start_node) {
            node.copy_values_to(start);
        }
    }

    /// Reflective slot lookup on the port's node type.
    #[must_use]
    pub fn data_id(&self, name: &str) -> Option<usize> {
        match &self.node {
            Some(node) => node.data_id(name),
            None => self.start_node.as_ref().and_then(|n| n.data_id(name)),
        }
    }
}

impl std::fmt::Debug for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("node_type", &self.node_type)
            .field("connected", &self.is_connected())
            .finish()
    }
}
