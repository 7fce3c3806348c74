// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! `flume-components` - the standard component library.
//!
//! Every model here is a user of the core APIs: it registers its ports and
//! parameters in its constructor, caches parameter values in `initialize`
//! and solves its local equations in `simulate_one_timestep`. The C
//! components write wave variables and characteristic impedances, the Q
//! components solve flow and effort against them, and the S components are
//! plain signal blocks.
//!
//! Use [`register`] to make the whole library available through an
//! [`Engine`](flume_engine::engine::Engine)'s component factory:
//!
//! ```rust
//! use flume_engine::engine::Engine;
//!
//! let engine = Engine::default();
//! flume_components::register(engine.component_factory()).unwrap();
//! let gain = engine.create_component("SignalGain").unwrap();
//! ```

pub mod hydraulic;
pub mod mechanic;
pub mod signal;

use flume_engine::external::ComponentFactory;
use flume_engine::types::SimResult;

/// Register every component of this library under its type name.
pub fn register(factory: &ComponentFactory) -> SimResult {
    factory.register("SignalSource", signal::source::SignalSource::creator)?;
    factory.register("SignalStep", signal::step::SignalStep::creator)?;
    factory.register("SignalGain", signal::gain::SignalGain::creator)?;
    factory.register("SignalSum", signal::sum::SignalSum::creator)?;
    factory.register("SignalSink", signal::sink::SignalSink::creator)?;
    factory.register(
        "HydraulicPressureSourceC",
        hydraulic::pressure_source::PressureSourceC::creator,
    )?;
    factory.register(
        "HydraulicMultiPressureSourceC",
        hydraulic::multi_pressure_source::MultiPressureSourceC::creator,
    )?;
    factory.register("HydraulicVolume", hydraulic::volume::Volume::creator)?;
    factory.register(
        "HydraulicLosslessLine",
        hydraulic::lossless_line::LosslessLine::creator,
    )?;
    factory.register(
        "HydraulicLaminarOrifice",
        hydraulic::orifice::LaminarOrifice::creator,
    )?;
    factory.register(
        "HydraulicTurbulentOrifice",
        hydraulic::turbulent_orifice::TurbulentOrifice::creator,
    )?;
    factory.register("HydraulicTank", hydraulic::tank::Tank::creator)?;
    factory.register(
        "MechanicTranslationalMass",
        mechanic::mass::TranslationalMass::creator,
    )?;
    factory.register(
        "MechanicTranslationalSpring",
        mechanic::spring::TranslationalSpring::creator,
    )?;
    Ok(())
}
