// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! Numerical building blocks for component models.
//!
//! Stateful helpers used inside `simulate_one_timestep`: a delay line, the
//! bilinear-transform integrators and filters, and the closed-form
//! turbulent-flow solver. Each is deterministic given the same input
//! sequence and timestep.
//!
//! The integrators and filters guard against being driven twice within the
//! same simulation step: updates carry the current simulation time and
//! become no-ops when the time has not advanced.

pub mod delay;
pub mod filter;
pub mod integrator;
pub mod turbulent;

pub use delay::Delay;
pub use filter::{FirstOrderFilter, SecondOrderFilter};
pub use integrator::{
    DoubleIntegratorWithDamping, DoubleIntegratorWithDampingAndCoulombFriction, Integrator,
    IntegratorLimited,
};
pub use turbulent::TurbulentFlowFunction;
