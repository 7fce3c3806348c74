// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! An ideal pressure source with a fan-out power port.
//!
//! One source can hold any number of attached circuits at the same
//! pressure: each connection gets its own sub-port and node, and the source
//! writes its wave variable to all of them. The pressure can optionally be
//! commanded through the signal input; unconnected, the `p` parameter is
//! used.
//!
//! # Ports
//!
//! This component has:
//!  - One hydraulic power multi-port: `mp` (one sub-port per connection)
//!  - One optional signal read port: `in`
//!
//! # Parameters
//!
//!  - `p`: the source pressure when `in` is unconnected [Pa]

use flume_engine::component::{BoxedModel, ComponentBase, Model, PortId};
use flume_engine::node::{hydraulic, signal};
use flume_engine::parameters::ParameterValue;
use flume_engine::types::{CqsType, Requirement, SimResult};

pub struct MultiPressureSourceC {
    base: ComponentBase,
    mp: PortId,
    input: PortId,
    p: f64,
    commanded: bool,
}

impl MultiPressureSourceC {
    pub fn creator() -> BoxedModel {
        let mut base = ComponentBase::new("HydraulicMultiPressureSourceC", CqsType::C);
        let mp = base.add_power_multi_port("mp", "hydraulic");
        let input = base.add_read_port("in", "signal", Requirement::NotRequired);
        base.register_parameter("p", "Default pressure", "Pa", ParameterValue::Real(1.0e5));
        Box::new(Self {
            base,
            mp,
            input,
            p: 1.0e5,
            commanded: false,
        })
    }

    fn pressure(&self) -> f64 {
        if self.commanded {
            self.base.read(self.input, signal::VALUE)
        } else {
            self.p
        }
    }
}

impl Model for MultiPressureSourceC {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        self.p = self.base.parameters().real("p")?;
        self.commanded = self.base.port(self.input).is_connected();

        // Every attached circuit starts at the source pressure
        let p = self.pressure();
        let port = self.base.port(self.mp);
        for idx in 0..port.num_ports() {
            port.write_sub(idx, hydraulic::PRESSURE, p);
        }
        self.simulate_one_timestep();
        Ok(())
    }

    fn simulate_one_timestep(&mut self) {
        let p = self.pressure();
        let port = self.base.port(self.mp);
        for idx in 0..port.num_ports() {
            port.write_sub(idx, hydraulic::WAVE, p);
            port.write_sub(idx, hydraulic::CHAR_IMPEDANCE, 0.0);
        }
    }
}
