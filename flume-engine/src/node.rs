// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! Nodes: the shared storage behind every connection.
//!
//! A node is a passive aggregate of named real-valued channels. One node
//! instance backs each electrically-connected set of ports; the components
//! around it read and write channels by compile-time slot index. The core
//! does not interpret channel semantics, with two exceptions driven by the
//! channel [`VariableKind`]s:
//!
//!  - at `load_start_values` time, the `Tlm` wave channels can be seeded
//!    from the matching `Intensity` channel (the projection table lives in
//!    the [`NodeDescriptor`]),
//!  - the connection assistant counts port roles per node when checking
//!    connection legality.
//!
//! A node also owns the log buffer that records its channels at fixed-time
//! slots during simulation.

use std::sync::atomic::Ordering::Relaxed;
use std::sync::{Arc, Mutex};

use atomic_float::AtomicF64;

use crate::factory::ClassFactory;
use crate::types::{CqsType, PortRole, SimError, VariableKind};

/// Describes one channel of a node type.
#[derive(Clone, Debug)]
pub struct ChannelDescriptor {
    /// Slot index into the node's value vector.
    pub slot: usize,
    /// Human-oriented name, e.g. "Pressure".
    pub name: String,
    /// Short name used in equations and plots, e.g. "p".
    pub short_name: String,
    /// Unit string, e.g. "Pa".
    pub unit: String,
    /// Channel classification.
    pub kind: VariableKind,
}

/// The immutable per-type layout shared by every node of one node type.
#[derive(Clone, Debug)]
pub struct NodeDescriptor {
    type_name: String,
    channels: Vec<ChannelDescriptor>,
    /// `(wave_slot, intensity_slot)` pairs evaluated when start values are
    /// loaded, so the first step sees consistent wave variables.
    wave_projections: Vec<(usize, usize)>,
}

impl NodeDescriptor {
    /// Create a descriptor with no channels; populate with
    /// [`channel`](Self::channel) and [`project_wave`](Self::project_wave).
    #[must_use]
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_owned(),
            channels: Vec::new(),
            wave_projections: Vec::new(),
        }
    }

    /// Append a channel; slots are assigned in declaration order.
    #[must_use]
    pub fn channel(mut self, name: &str, short_name: &str, unit: &str, kind: VariableKind) -> Self {
        self.channels.push(ChannelDescriptor {
            slot: self.channels.len(),
            name: name.to_owned(),
            short_name: short_name.to_owned(),
            unit: unit.to_owned(),
            kind,
        });
        self
    }

    /// Declare that `wave_slot` is seeded from `intensity_slot` when start
    /// values are loaded.
    #[must_use]
    pub fn project_wave(mut self, wave_slot: usize, intensity_slot: usize) -> Self {
        self.wave_projections.push((wave_slot, intensity_slot));
        self
    }

    /// The node type tag, e.g. "hydraulic".
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Number of channels; immutable for the type.
    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// The channel descriptors in slot order.
    #[must_use]
    pub fn channels(&self) -> &[ChannelDescriptor] {
        &self.channels
    }

    /// Reflective lookup of a slot index by channel name (long or short).
    #[must_use]
    pub fn data_id(&self, name: &str) -> Option<usize> {
        self.channels
            .iter()
            .find(|c| c.name == name || c.short_name == name)
            .map(|c| c.slot)
    }

    /// The start-value wave projections of this type.
    #[must_use]
    pub fn wave_projections(&self) -> &[(usize, usize)] {
        &self.wave_projections
    }
}

/// A non-owning back-reference from a node to a connected port.
///
/// The port side owns the `Arc<Node>`; the node keeps the reverse direction
/// as names resolved through the owning system. The connection assistant is
/// the only code that mutates the membership, keeping both directions
/// consistent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortRef {
    /// Name of the owning component within the node's owner system.
    pub component: String,
    /// Port name (sub-ports carry their generated name).
    pub port: String,
    /// Role of the port (sub-ports carry their effective role).
    pub role: PortRole,
    /// CQS type of the owning component at connect time.
    pub cqs: CqsType,
}

/// Log buffer state of a node.
///
/// `time_samples.len() == value_samples.len()` always holds and each inner
/// row has the node's channel count.
struct NodeLog {
    enabled: bool,
    allocated: bool,
    log_dt: f64,
    last_log_time: f64,
    slots: usize,
    ctr: usize,
    time_samples: Vec<f64>,
    value_samples: Vec<Vec<f64>>,
}

impl NodeLog {
    fn new() -> Self {
        Self {
            enabled: true,
            allocated: false,
            log_dt: 0.0,
            last_log_time: 0.0,
            slots: 0,
            ctr: 0,
            time_samples: Vec::new(),
            value_samples: Vec::new(),
        }
    }
}

/// Shared storage for a set of connected ports.
///
/// Channel values are `AtomicF64` accessed with relaxed ordering: within a
/// timestep each channel has a single writing phase (C writes wave and
/// impedance, Q writes flow and effort, S writes signal values) and the
/// scheduler's phase barriers provide all cross-thread ordering.
pub struct Node {
    descriptor: Arc<NodeDescriptor>,
    values: Vec<AtomicF64>,
    ports: Mutex<Vec<PortRef>>,
    log: Mutex<NodeLog>,
}

impl Node {
    /// Create a node of the given type with all channels zeroed.
    #[must_use]
    pub fn new(descriptor: &Arc<NodeDescriptor>) -> Arc<Self> {
        let values = (0..descriptor.num_channels())
            .map(|_| AtomicF64::new(0.0))
            .collect();
        Arc::new(Self {
            descriptor: descriptor.clone(),
            values,
            ports: Mutex::new(Vec::new()),
            log: Mutex::new(NodeLog::new()),
        })
    }

    /// The node type tag.
    #[must_use]
    pub fn type_name(&self) -> &str {
        self.descriptor.type_name()
    }

    /// The layout of this node.
    #[must_use]
    pub fn descriptor(&self) -> &Arc<NodeDescriptor> {
        &self.descriptor
    }

    /// Read one channel. Slot indices are the compile-time enumerations of
    /// the node type; no bounds checking beyond the vector's own.
    #[must_use]
    pub fn value(&self, slot: usize) -> f64 {
        self.values[slot].load(Relaxed)
    }

    /// Write one channel.
    pub fn set_value(&self, slot: usize, value: f64) {
        self.values[slot].store(value, Relaxed);
    }

    /// Reflective slot lookup by channel name.
    #[must_use]
    pub fn data_id(&self, name: &str) -> Option<usize> {
        self.descriptor.data_id(name)
    }

    /// Snapshot of every channel in slot order.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.values.iter().map(|v| v.load(Relaxed)).collect()
    }

    // --- port membership (maintained by the connection assistant) ---

    pub(crate) fn attach_port(&self, port_ref: PortRef) {
        let mut ports = self.ports.lock().unwrap();
        if !ports.contains(&port_ref) {
            ports.push(port_ref);
        }
    }

    pub(crate) fn detach_port(&self, component: &str, port: &str) {
        self.ports
            .lock()
            .unwrap()
            .retain(|p| !(p.component == component && p.port == port));
    }

    pub(crate) fn rename_component_refs(&self, old_name: &str, new_name: &str) {
        for port_ref in self.ports.lock().unwrap().iter_mut() {
            if port_ref.component == old_name {
                port_ref.component = new_name.to_owned();
            }
        }
    }

    /// The ports currently backed by this node.
    #[must_use]
    pub fn connected_ports(&self) -> Vec<PortRef> {
        self.ports.lock().unwrap().clone()
    }

    /// Whether the named port is registered on this node.
    #[must_use]
    pub fn is_connected_to(&self, component: &str, port: &str) -> bool {
        self.ports
            .lock()
            .unwrap()
            .iter()
            .any(|p| p.component == component && p.port == port)
    }

    /// Count attached ports of one role.
    #[must_use]
    pub fn num_ports_with_role(&self, role: PortRole) -> usize {
        self.ports
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.role == role)
            .count()
    }

    // --- logging ---

    /// Configure the log schedule from a desired sample count.
    ///
    /// `n_samples` is clamped so that no more samples are requested than the
    /// simulation will produce; the return value is the clamped sample
    /// count so the caller can warn about the reduction.
    pub fn set_log_settings_num_samples(
        &self,
        n_samples: usize,
        start: f64,
        stop: f64,
        sample_time: f64,
    ) -> usize {
        let sim_steps = if sample_time > 0.0 {
            ((stop - start) / sample_time + 0.5) as usize
        } else {
            0
        };
        // One sample is taken at start time and one at stop time, so the
        // schedule divides the span into n_samples-1 intervals.
        let mut intervals = n_samples.saturating_sub(1).max(1);
        let mut clamped = n_samples;
        if sim_steps > 0 && intervals > sim_steps {
            intervals = sim_steps;
            clamped = sim_steps + 1;
        }
        let log_dt = (stop - start) / intervals as f64;
        self.set_log_schedule(log_dt, start, stop);
        clamped
    }

    /// Configure the log schedule from a skip factor on the simulation
    /// timestep.
    pub fn set_log_settings_skip_factor(
        &self,
        factor: f64,
        start: f64,
        stop: f64,
        sample_time: f64,
    ) {
        let log_dt = sample_time * factor.max(1.0);
        self.set_log_schedule(log_dt, start, stop);
    }

    /// Configure the log schedule directly from a sample period.
    pub fn set_log_settings_sample_time(&self, log_dt: f64, start: f64, stop: f64) {
        self.set_log_schedule(log_dt, start, stop);
    }

    fn set_log_schedule(&self, log_dt: f64, start: f64, stop: f64) {
        let mut log = self.log.lock().unwrap();
        log.log_dt = log_dt;
        log.last_log_time = start - log_dt;
        log.slots = if log_dt > 0.0 {
            ((stop - start) / log_dt + 0.5) as usize + 1
        } else {
            1
        };
    }

    /// Pre-size the log buffers to the configured slot count and rewind the
    /// fill counter, so the same model can be simulated several times in a
    /// row.
    pub fn pre_allocate_log_space(&self) {
        let channels = self.descriptor.num_channels();
        let mut log = self.log.lock().unwrap();
        let slots = log.slots;
        log.time_samples.clear();
        log.time_samples.resize(slots, 0.0);
        log.value_samples.clear();
        log.value_samples.resize(slots, vec![0.0; channels]);
        log.allocated = true;
        log.ctr = 0;
    }

    /// Append one sample if the schedule calls for it at `time`.
    ///
    /// The next due time advances by `log_dt` rather than to `time`, so the
    /// slots stay equally spaced even under float drift; a tenth of `log_dt`
    /// of slack absorbs the drift in the comparison itself.
    pub fn log(&self, time: f64) {
        let values: Vec<f64> = self.values();
        let mut log = self.log.lock().unwrap();
        if !log.enabled {
            return;
        }
        if time >= log.last_log_time + log.log_dt - log.log_dt / 10.0 {
            if log.allocated {
                let ctr = log.ctr;
                if ctr < log.time_samples.len() {
                    log.time_samples[ctr] = time;
                    log.value_samples[ctr] = values;
                }
            } else {
                log.time_samples.push(time);
                log.value_samples.push(values);
            }
            log.ctr += 1;
            log.last_log_time += log.log_dt;
        }
    }

    /// Enable sample collection (the default).
    pub fn enable_log(&self) {
        self.log.lock().unwrap().enabled = true;
    }

    /// Disable sample collection for this node.
    pub fn disable_log(&self) {
        self.log.lock().unwrap().enabled = false;
    }

    /// Number of samples actually filled during the last run.
    #[must_use]
    pub fn log_ctr(&self) -> usize {
        self.log.lock().unwrap().ctr
    }

    /// Number of pre-sized log slots.
    #[must_use]
    pub fn num_log_slots(&self) -> usize {
        self.log.lock().unwrap().slots
    }

    /// The logged sample times.
    #[must_use]
    pub fn time_vector(&self) -> Vec<f64> {
        self.log.lock().unwrap().time_samples.clone()
    }

    /// The logged values of one channel, in sample order.
    #[must_use]
    pub fn log_data(&self, slot: usize) -> Vec<f64> {
        self.log
            .lock()
            .unwrap()
            .value_samples
            .iter()
            .map(|row| row[slot])
            .collect()
    }

    /// Copy this node's channel values onto another node of the same type.
    pub fn copy_values_to(&self, other: &Node) {
        for slot in 0..self.descriptor.num_channels() {
            other.set_value(slot, self.value(slot));
        }
    }

    /// Apply the node type's start-value projections (e.g. seed the wave
    /// channel from the pressure channel).
    pub fn project_start_values(&self) {
        for &(wave, intensity) in self.descriptor.wave_projections() {
            self.set_value(wave, self.value(intensity));
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("type", &self.type_name())
            .field("values", &self.values())
            .finish()
    }
}

/// The string-keyed registry of node descriptors.
pub type NodeFactory = ClassFactory<Arc<NodeDescriptor>>;

/// Slot indices of the built-in `signal` node type.
pub mod signal {
    /// The signal value.
    pub const VALUE: usize = 0;
}

/// Slot indices of the built-in `hydraulic` node type.
pub mod hydraulic {
    /// Volume flow [m^3/s].
    pub const FLOW: usize = 0;
    /// Pressure [Pa].
    pub const PRESSURE: usize = 1;
    /// Temperature [K].
    pub const TEMPERATURE: usize = 2;
    /// TLM wave variable [Pa].
    pub const WAVE: usize = 3;
    /// Characteristic impedance [Pa s/m^3].
    pub const CHAR_IMPEDANCE: usize = 4;
    /// Heat flow [W].
    pub const HEAT_FLOW: usize = 5;
}

/// Slot indices of the built-in `pneumatic` node type.
pub mod pneumatic {
    /// Mass flow [kg/s].
    pub const MASS_FLOW: usize = 0;
    /// Energy flow [J/s].
    pub const ENERGY_FLOW: usize = 1;
    /// Pressure [Pa].
    pub const PRESSURE: usize = 2;
    /// Temperature [K].
    pub const TEMPERATURE: usize = 3;
    /// TLM wave variable [Pa].
    pub const WAVE: usize = 4;
    /// Characteristic impedance.
    pub const CHAR_IMPEDANCE: usize = 5;
}

/// Slot indices of the built-in `mechanic` node type.
pub mod mechanic {
    /// Velocity [m/s].
    pub const VELOCITY: usize = 0;
    /// Force [N].
    pub const FORCE: usize = 1;
    /// Position [m].
    pub const POSITION: usize = 2;
    /// TLM wave variable [N].
    pub const WAVE: usize = 3;
    /// Characteristic impedance [N s/m].
    pub const CHAR_IMPEDANCE: usize = 4;
    /// Equivalent mass [kg].
    pub const EQ_MASS: usize = 5;
}

/// Slot indices of the built-in `mechanicrotational` node type.
pub mod mechanic_rotational {
    /// Angular velocity [rad/s].
    pub const ANGULAR_VELOCITY: usize = 0;
    /// Torque [Nm].
    pub const TORQUE: usize = 1;
    /// Angle [rad].
    pub const ANGLE: usize = 2;
    /// TLM wave variable [Nm].
    pub const WAVE: usize = 3;
    /// Characteristic impedance.
    pub const CHAR_IMPEDANCE: usize = 4;
    /// Equivalent inertia [kg m^2].
    pub const EQ_INERTIA: usize = 5;
}

/// Slot indices of the built-in `electric` node type.
pub mod electric {
    /// Voltage [V].
    pub const VOLTAGE: usize = 0;
    /// Current [A].
    pub const CURRENT: usize = 1;
    /// TLM wave variable [V].
    pub const WAVE: usize = 2;
    /// Characteristic impedance [V/A].
    pub const CHAR_IMPEDANCE: usize = 3;
}

/// Register the built-in node types.
pub fn register_nodes(factory: &NodeFactory) -> Result<(), SimError> {
    use VariableKind::{Default, Flow, Hidden, Intensity, Tlm};

    factory.register(
        "signal",
        Arc::new(NodeDescriptor::new("signal").channel("Value", "y", "-", Default)),
    )?;
    factory.register(
        "hydraulic",
        Arc::new(
            NodeDescriptor::new("hydraulic")
                .channel("Flow", "q", "m^3/s", Flow)
                .channel("Pressure", "p", "Pa", Intensity)
                .channel("Temperature", "T", "K", Hidden)
                .channel("WaveVariable", "c", "Pa", Tlm)
                .channel("CharImp", "Zc", "Pa s/m^3", Tlm)
                .channel("HeatFlow", "Qdot", "W", Hidden)
                .project_wave(hydraulic::WAVE, hydraulic::PRESSURE),
        ),
    )?;
    factory.register(
        "pneumatic",
        Arc::new(
            NodeDescriptor::new("pneumatic")
                .channel("MassFlow", "mdot", "kg/s", Flow)
                .channel("EnergyFlow", "Qdot", "J/s", Hidden)
                .channel("Pressure", "p", "Pa", Intensity)
                .channel("Temperature", "T", "K", Hidden)
                .channel("WaveVariable", "c", "Pa", Tlm)
                .channel("CharImp", "Zc", "?", Tlm)
                .project_wave(pneumatic::WAVE, pneumatic::PRESSURE),
        ),
    )?;
    factory.register(
        "mechanic",
        Arc::new(
            NodeDescriptor::new("mechanic")
                .channel("Velocity", "v", "m/s", Flow)
                .channel("Force", "F", "N", Intensity)
                .channel("Position", "x", "m", Default)
                .channel("WaveVariable", "c", "N", Tlm)
                .channel("CharImp", "Zc", "N s/m", Tlm)
                .channel("EquivalentMass", "me", "kg", Hidden)
                .project_wave(mechanic::WAVE, mechanic::FORCE),
        ),
    )?;
    factory.register(
        "mechanicrotational",
        Arc::new(
            NodeDescriptor::new("mechanicrotational")
                .channel("AngularVelocity", "w", "rad/s", Flow)
                .channel("Torque", "T", "Nm", Intensity)
                .channel("Angle", "a", "rad", Default)
                .channel("WaveVariable", "c", "Nm", Tlm)
                .channel("CharImp", "Zc", "?", Tlm)
                .project_wave(mechanic_rotational::WAVE, mechanic_rotational::TORQUE),
        ),
    )?;
    factory.register(
        "electric",
        Arc::new(
            NodeDescriptor::new("electric")
                .channel("Voltage", "U", "V", Intensity)
                .channel("Current", "I", "A", Flow)
                .channel("WaveVariable", "c", "V", Tlm)
                .channel("CharImp", "Zc", "V/A", Tlm)
                .project_wave(electric::WAVE, electric::VOLTAGE),
        ),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VariableKind;

    fn hydraulic_node() -> Arc<Node> {
        let factory = NodeFactory::new();
        register_nodes(&factory).unwrap();
        Node::new(&factory.get("hydraulic").unwrap())
    }

    #[test]
    fn data_id_lookup() {
        let node = hydraulic_node();
        assert_eq!(node.data_id("Pressure"), Some(hydraulic::PRESSURE));
        assert_eq!(node.data_id("p"), Some(hydraulic::PRESSURE));
        assert_eq!(node.data_id("nonsense"), None);
    }

    #[test]
    fn wave_projection_seeds_wave_from_pressure() {
        let node = hydraulic_node();
        node.set_value(hydraulic::PRESSURE, 1.0e5);
        node.project_start_values();
        assert_eq!(node.value(hydraulic::WAVE), 1.0e5);
    }

    #[test]
    fn equal_spaced_logging_under_drift() {
        let node = hydraulic_node();
        // 5 samples over 0..0.04 at Ts=0.01: every step plus the final one
        let clamped = node.set_log_settings_num_samples(5, 0.0, 0.04, 0.01);
        assert_eq!(clamped, 5);
        node.pre_allocate_log_space();
        assert_eq!(node.num_log_slots(), 5);

        let mut t = 0.0;
        for _ in 0..4 {
            node.log(t);
            t += 0.01;
        }
        node.log(t);

        assert_eq!(node.log_ctr(), 5);
        let times = node.time_vector();
        assert_eq!(times.len(), 5);
        assert!((times[3] - 0.03).abs() < 1e-12);
    }

    #[test]
    fn sample_count_clamped_to_simulation_steps() {
        let node = hydraulic_node();
        let clamped = node.set_log_settings_num_samples(100, 0.0, 0.05, 0.01);
        assert_eq!(clamped, 6);
    }

    #[test]
    fn log_rows_match_channel_count() {
        let node = hydraulic_node();
        node.set_log_settings_num_samples(3, 0.0, 0.02, 0.01);
        node.pre_allocate_log_space();
        node.set_value(hydraulic::PRESSURE, 7.0);
        node.log(0.0);

        let rows = node.log_data(hydraulic::PRESSURE);
        assert_eq!(rows.len(), node.num_log_slots());
        assert_eq!(rows[0], 7.0);
        // Unfilled slots stay zero-initialized
        assert_eq!(rows[2], 0.0);
    }

    #[test]
    fn skip_factor_schedule_logs_every_other_step() {
        let node = hydraulic_node();
        node.set_log_settings_skip_factor(2.0, 0.0, 0.01, 0.001);
        node.pre_allocate_log_space();
        assert_eq!(node.num_log_slots(), 6);

        let mut t = 0.0;
        for _ in 0..10 {
            node.log(t);
            t += 0.001;
        }
        node.log(t);
        assert_eq!(node.log_ctr(), 6);
    }

    #[test]
    fn sample_time_schedule_rounds_to_nearest_slot_count() {
        let node = hydraulic_node();
        node.set_log_settings_sample_time(0.003, 0.0, 0.01);
        // round(0.01 / 0.003) + 1 final slot
        assert_eq!(node.num_log_slots(), 4);
    }

    #[test]
    fn disabled_node_collects_nothing() {
        let node = hydraulic_node();
        node.set_log_settings_num_samples(3, 0.0, 0.02, 0.01);
        node.pre_allocate_log_space();
        node.disable_log();
        node.log(0.0);
        assert_eq!(node.log_ctr(), 0);
        node.enable_log();
        node.log(0.01);
        assert_eq!(node.log_ctr(), 1);
    }

    #[test]
    fn descriptor_kinds() {
        let node = hydraulic_node();
        let channels = node.descriptor().channels();
        assert_eq!(channels[hydraulic::FLOW].kind, VariableKind::Flow);
        assert_eq!(channels[hydraulic::WAVE].kind, VariableKind::Tlm);
    }
}
