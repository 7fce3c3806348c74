// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! A signal adder with a fan-in input.
//!
//! # Ports
//!
//! This component has:
//!  - One read multi-port: `in` (one sub-port per connection)
//!  - One write port: `out`
//!
//! The output is the sum over every connected input; with nothing
//! connected the output is zero.

use flume_engine::component::{BoxedModel, ComponentBase, Model, PortId};
use flume_engine::node::signal;
use flume_engine::types::{CqsType, Requirement, SimResult};

pub struct SignalSum {
    base: ComponentBase,
    inputs: PortId,
    out: PortId,
}

impl SignalSum {
    pub fn creator() -> BoxedModel {
        let mut base = ComponentBase::new("SignalSum", CqsType::S);
        let inputs = base.add_read_multi_port("in", "signal");
        let out = base.add_write_port("out", "signal", Requirement::NotRequired);
        Box::new(Self { base, inputs, out })
    }
}

impl Model for SignalSum {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        self.simulate_one_timestep();
        Ok(())
    }

    fn simulate_one_timestep(&mut self) {
        let port = self.base.port(self.inputs);
        let mut sum = 0.0;
        for idx in 0..port.num_ports() {
            sum += port.read_sub(idx, signal::VALUE);
        }
        self.base.write(self.out, signal::VALUE, sum);
    }
}
