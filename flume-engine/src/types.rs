// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Shared types.

use std::error::Error;
use std::fmt;

// Simulation errors

#[macro_export]
/// Build an `Err([SimError])` from a format string
macro_rules! sim_error {
    ($($arg:tt)+) => {
        Err($crate::types::SimError(format!($($arg)+)))
    };
}

/// The `SimError` is what should be returned in the case of an error
#[derive(Debug)]
pub struct SimError(pub String);

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error: {}", self.0)
    }
}

impl Error for SimError {}

/// The SimResult is the return type for most simulation functions
pub type SimResult = Result<(), SimError>;

/// Outcome of driving a simulation run to its stop time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SimOutcome {
    /// The stop time was reached.
    Finished,
    /// `stop_simulation` was observed; `finalize` has been run.
    Canceled,
    /// `initialize` has not completed successfully; nothing was simulated.
    NotReady,
}

/// The solver role of a component in the TLM scheme.
///
/// The scheduler executes all S components, then all C, then all Q within
/// each timestep, and the connection assistant uses the type to reject
/// C-C and Q-Q power connections.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CqsType {
    /// Characteristic/capacitive: writes wave variables and impedances.
    C,
    /// Flow/resistive: solves the local constitutive law, writes flow and
    /// effort.
    Q,
    /// Pure signal computation, no TLM semantics.
    S,
    /// Not yet determined (containers before derivation, or misconfigured
    /// components). Systems with undefined members refuse to initialize.
    #[default]
    Undefined,
}

impl fmt::Display for CqsType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CqsType::C => write!(f, "C"),
            CqsType::Q => write!(f, "Q"),
            CqsType::S => write!(f, "S"),
            CqsType::Undefined => write!(f, "Undefined"),
        }
    }
}

/// The role a port plays on its component.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PortRole {
    /// Bidirectional TLM connection carrying flow, effort and wave channels.
    Power,
    /// Reads values from the node, never writes.
    Read,
    /// Writes one value to the node (signal sources).
    Write,
    /// A port on a container that forwards to an interior node.
    System,
    /// A power port that owns one sub-port per external connection.
    PowerMulti,
    /// A read port that owns one sub-port per external connection.
    ReadMulti,
}

impl PortRole {
    /// Whether this role is a multi-port container role.
    #[must_use]
    pub fn is_multi(self) -> bool {
        matches!(self, PortRole::PowerMulti | PortRole::ReadMulti)
    }

    /// The role a sub-port allocated by this multi-port carries.
    #[must_use]
    pub fn sub_role(self) -> PortRole {
        match self {
            PortRole::PowerMulti => PortRole::Power,
            PortRole::ReadMulti => PortRole::Read,
            other => other,
        }
    }
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PortRole::Power => write!(f, "PowerPort"),
            PortRole::Read => write!(f, "ReadPort"),
            PortRole::Write => write!(f, "WritePort"),
            PortRole::System => write!(f, "SystemPort"),
            PortRole::PowerMulti => write!(f, "PowerMultiPort"),
            PortRole::ReadMulti => write!(f, "ReadMultiPort"),
        }
    }
}

/// The kind of a node channel, which drives start-value projection and
/// channel classification. The core does not otherwise interpret channel
/// semantics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum VariableKind {
    /// A through variable (flow, current, velocity).
    Flow,
    /// An across variable (pressure, voltage, force).
    Intensity,
    /// A TLM wave variable or characteristic impedance.
    Tlm,
    /// An ordinary value channel.
    #[default]
    Default,
    /// Present in the node but not offered for plotting or start values.
    Hidden,
}

/// Whether a port must be connected before the owning system can
/// initialize.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    /// `initialize` fails while this port is unconnected.
    Required,
    /// The port may be left unconnected; reads serve its start values.
    NotRequired,
}
