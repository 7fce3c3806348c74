// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A step signal source.
//!
//! # Ports
//!
//! This component has:
//!  - One write port: `out`
//!
//! # Parameters
//!
//!  - `y0`: base value before the step
//!  - `amplitude`: added to the base value from `t_step` on
//!  - `t_step`: step time [s]

use flume_engine::component::{BoxedModel, ComponentBase, Model, PortId};
use flume_engine::node::signal;
use flume_engine::parameters::ParameterValue;
use flume_engine::types::{CqsType, Requirement, SimResult};

pub struct SignalStep {
    base: ComponentBase,
    out: PortId,
    y0: f64,
    amplitude: f64,
    t_step: f64,
}

impl SignalStep {
    pub fn creator() -> BoxedModel {
        let mut base = ComponentBase::new("SignalStep", CqsType::S);
        let out = base.add_write_port("out", "signal", Requirement::NotRequired);
        base.register_parameter("y0", "Base value", "-", ParameterValue::Real(0.0));
        base.register_parameter("amplitude", "Step amplitude", "-", ParameterValue::Real(1.0));
        base.register_parameter("t_step", "Step time", "s", ParameterValue::Real(1.0));
        Box::new(Self {
            base,
            out,
            y0: 0.0,
            amplitude: 1.0,
            t_step: 1.0,
        })
    }
}

impl Model for SignalStep {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        self.y0 = self.base.parameters().real("y0")?;
        self.amplitude = self.base.parameters().real("amplitude")?;
        self.t_step = self.base.parameters().real("t_step")?;
        self.base.write(self.out, signal::VALUE, self.y0);
        Ok(())
    }

    fn simulate_one_timestep(&mut self) {
        let y = if self.base.time() < self.t_step {
            self.y0
        } else {
            self.y0 + self.amplitude
        };
        self.base.write(self.out, signal::VALUE, y);
    }
}
