// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A constant signal source.
//!
//! # Ports
//!
//! This component has:
//!  - One write port: `out`
//!
//! # Parameters
//!
//!  - `y`: the constant output value

use flume_engine::component::{BoxedModel, ComponentBase, Model, PortId};
use flume_engine::node::signal;
use flume_engine::parameters::ParameterValue;
use flume_engine::types::{CqsType, Requirement, SimResult};

pub struct SignalSource {
    base: ComponentBase,
    out: PortId,
    y: f64,
}

impl SignalSource {
    pub fn creator() -> BoxedModel {
        let mut base = ComponentBase::new("SignalSource", CqsType::S);
        let out = base.add_write_port("out", "signal", Requirement::NotRequired);
        base.register_parameter("y", "Output value", "-", ParameterValue::Real(0.0));
        Box::new(Self { base, out, y: 0.0 })
    }
}

impl Model for SignalSource {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        self.y = self.base.parameters().real("y")?;
        self.base.write(self.out, signal::VALUE, self.y);
        Ok(())
    }

    fn simulate_one_timestep(&mut self) {
        self.base.write(self.out, signal::VALUE, self.y);
    }
}
