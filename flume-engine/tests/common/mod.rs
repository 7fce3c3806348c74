// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! Shared fixtures for the engine integration tests.
//!
//! The probes here report through their nodes instead of through fields, so
//! tests can read them back with the ordinary introspection API after the
//! component has been boxed into a system.

// Not every test binary uses every fixture
#![allow(dead_code)]

use flume_engine::component::{BoxedModel, ComponentBase, Model, PortId};
use flume_engine::node::signal;
use flume_engine::types::{CqsType, Requirement, SimResult};

/// An S component that writes the number of steps it has taken to its
/// `out` port, so multi-rate tests can count sub-steps via `last_value`.
pub struct StepCounter {
    base: ComponentBase,
    out: PortId,
    steps: f64,
}

impl StepCounter {
    pub fn creator() -> BoxedModel {
        let mut base = ComponentBase::new("StepCounter", CqsType::S);
        let out = base.add_write_port("out", "signal", Requirement::NotRequired);
        Box::new(Self {
            base,
            out,
            steps: 0.0,
        })
    }
}

impl Model for StepCounter {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        self.steps = 0.0;
        self.base.write(self.out, signal::VALUE, 0.0);
        Ok(())
    }

    fn simulate_one_timestep(&mut self) {
        self.steps += 1.0;
        self.base.write(self.out, signal::VALUE, self.steps);
    }
}

/// An S component that writes the number of `finalize` calls it has seen
/// to its `out` port.
pub struct FinalizeProbe {
    base: ComponentBase,
    out: PortId,
    finalized: f64,
}

impl FinalizeProbe {
    pub fn creator() -> BoxedModel {
        let mut base = ComponentBase::new("FinalizeProbe", CqsType::S);
        let out = base.add_write_port("out", "signal", Requirement::NotRequired);
        Box::new(Self {
            base,
            out,
            finalized: 0.0,
        })
    }
}

impl Model for FinalizeProbe {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        self.finalized = 0.0;
        self.base.write(self.out, signal::VALUE, 0.0);
        Ok(())
    }

    fn simulate_one_timestep(&mut self) {}

    fn finalize(&mut self) {
        self.finalized += 1.0;
        self.base.write(self.out, signal::VALUE, self.finalized);
    }
}

/// An S component whose `initialize` always fails, for abort-path tests.
pub struct BrokenInit {
    base: ComponentBase,
}

impl BrokenInit {
    pub fn creator() -> BoxedModel {
        Box::new(Self {
            base: ComponentBase::new("BrokenInit", CqsType::S),
        })
    }
}

impl Model for BrokenInit {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        flume_engine::sim_error!("self-diagnostic failed")
    }

    fn simulate_one_timestep(&mut self) {}
}
