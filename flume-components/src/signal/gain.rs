// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A signal gain.
//!
//! # Ports
//!
//! This component has:
//!  - One read port: `in`
//!  - One write port: `out`
//!
//! # Parameters
//!
//!  - `k`: the gain factor

use flume_engine::component::{BoxedModel, ComponentBase, Model, PortId};
use flume_engine::node::signal;
use flume_engine::parameters::ParameterValue;
use flume_engine::types::{CqsType, Requirement, SimResult};

pub struct SignalGain {
    base: ComponentBase,
    input: PortId,
    out: PortId,
    k: f64,
}

impl SignalGain {
    pub fn creator() -> BoxedModel {
        let mut base = ComponentBase::new("SignalGain", CqsType::S);
        let input = base.add_read_port("in", "signal", Requirement::Required);
        let out = base.add_write_port("out", "signal", Requirement::NotRequired);
        base.register_parameter("k", "Gain factor", "-", ParameterValue::Real(1.0));
        Box::new(Self {
            base,
            input,
            out,
            k: 1.0,
        })
    }
}

impl Model for SignalGain {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        self.k = self.base.parameters().real("k")?;
        self.simulate_one_timestep();
        Ok(())
    }

    fn simulate_one_timestep(&mut self) {
        let u = self.base.read(self.input, signal::VALUE);
        self.base.write(self.out, signal::VALUE, self.k * u);
    }
}
