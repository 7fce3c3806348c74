// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

// TODO: enable this warning once the remaining public items are documented.
// #![warn(missing_docs)]

#![doc(test(attr(warn(unused))))]

//! `FLUME` - the fixed-step lumped-element simulation engine.
//!
//! This library provides the simulation core: a component/port/node/system
//! graph executing a Transmission-Line-Method (TLM) fixed-step scheme with
//! multi-rate subsystems, optional multi-threading and deterministic node
//! logging.
//!
//! Components come in three solver roles. **C** components model the
//! capacitive elements: they read flow and effort from their power ports
//! and write the wave variables and characteristic impedances that carry
//! the TLM across the step boundary. **Q** components model the resistive
//! elements: they read waves and impedances and solve their constitutive
//! law for flow and effort. **S** components are plain signal computations.
//! Within each step the scheduler runs all S, then all C, then all Q, which
//! together with the lines' explicit time delays is what decouples the
//! solves.
//!
//! # Simple Application
//!
//! A very simple application would look like:
//!
//! ```rust
//! use flume_engine::engine::Engine;
//! use flume_engine::types::SimOutcome;
//!
//! let engine = Engine::default();
//! flume_components::register(engine.component_factory()).unwrap();
//!
//! let mut system = engine.create_system("model");
//! system.add_component(engine.create_component("SignalSource").unwrap()).unwrap();
//! system.add_component(engine.create_component("SignalSink").unwrap()).unwrap();
//! system.connect("SignalSource", "out", "SignalSink", "in").unwrap();
//!
//! system.set_desired_timestep(0.001);
//! system.initialize(0.0, 0.1).unwrap();
//! assert_eq!(system.simulate(0.1), SimOutcome::Finished);
//! ```
//!
//! The component models themselves live outside the core: the
//! `flume-components` crate ships the standard library of signal, hydraulic
//! and mechanic components, and further libraries can be registered at run
//! time through [`Engine::load_external_component_lib`](engine::Engine::load_external_component_lib).

pub mod component;
pub mod connect;
pub mod engine;
pub mod executor;
pub mod external;
pub mod factory;
pub mod node;
pub mod numeric;
pub mod parameters;
pub mod port;
pub mod system;
pub mod test_helpers;
pub mod types;
