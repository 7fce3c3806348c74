// Copyright (c) 2024 Graphcore Ltd. All rights reserved.

//! A lossless transmission line.
//!
//! A pure transport delay: the wave leaving one end is the wave that
//! entered the other end `T` seconds earlier, unchanged. `T` is rounded to
//! a whole number of timesteps by the delay lines.
//!
//! # Ports
//!
//! This component has:
//!  - Two hydraulic power ports: `p1`, `p2`
//!
//! # Parameters
//!
//!  - `T`: transport delay through the line [s]
//!  - `Zc`: characteristic impedance [Pa s/m^3]

use flume_engine::component::{BoxedModel, ComponentBase, Model, PortId};
use flume_engine::node::hydraulic;
use flume_engine::numeric::Delay;
use flume_engine::parameters::ParameterValue;
use flume_engine::types::{CqsType, SimResult};
use flume_track::debug;

pub struct LosslessLine {
    base: ComponentBase,
    p1: PortId,
    p2: PortId,
    zc: f64,
    to_p2: Delay,
    to_p1: Delay,
}

impl LosslessLine {
    pub fn creator() -> BoxedModel {
        let mut base = ComponentBase::new("HydraulicLosslessLine", CqsType::C);
        let p1 = base.add_power_port("p1", "hydraulic");
        let p2 = base.add_power_port("p2", "hydraulic");
        base.register_parameter("T", "Transport delay", "s", ParameterValue::Real(1.0e-3));
        base.register_parameter(
            "Zc",
            "Characteristic impedance",
            "Pa s/m^3",
            ParameterValue::Real(1.0e9),
        );
        Box::new(Self {
            base,
            p1,
            p2,
            zc: 1.0e9,
            to_p2: Delay::new(),
            to_p1: Delay::new(),
        })
    }
}

impl Model for LosslessLine {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        let delay_time = self.base.parameters().real("T")?;
        self.zc = self.base.parameters().real("Zc")?;
        let ts = self.base.timestep();

        // Each direction starts out carrying its own end's pressure, so a
        // line in equilibrium stays put
        let c1 = self.base.read(self.p1, hydraulic::PRESSURE);
        let c2 = self.base.read(self.p2, hydraulic::PRESSURE);
        self.to_p1.initialize_time(delay_time, ts, c1);
        self.to_p2.initialize_time(delay_time, ts, c2);
        debug!(self.base.entity() ;
            "Transport delay {delay_time} s rounds to {} steps", self.to_p1.len());

        self.base.write(self.p1, hydraulic::WAVE, c1);
        self.base.write(self.p1, hydraulic::CHAR_IMPEDANCE, self.zc);
        self.base.write(self.p2, hydraulic::WAVE, c2);
        self.base.write(self.p2, hydraulic::CHAR_IMPEDANCE, self.zc);
        Ok(())
    }

    fn simulate_one_timestep(&mut self) {
        let q1 = self.base.read(self.p1, hydraulic::FLOW);
        let q2 = self.base.read(self.p2, hydraulic::FLOW);
        let c1 = self.base.read(self.p1, hydraulic::WAVE);
        let c2 = self.base.read(self.p2, hydraulic::WAVE);

        // The wave entering one end emerges at the other after the delay
        let c2_new = self.to_p2.update(c1 + 2.0 * self.zc * q1);
        let c1_new = self.to_p1.update(c2 + 2.0 * self.zc * q2);

        self.base.write(self.p1, hydraulic::WAVE, c1_new);
        self.base.write(self.p1, hydraulic::CHAR_IMPEDANCE, self.zc);
        self.base.write(self.p2, hydraulic::WAVE, c2_new);
        self.base.write(self.p2, hydraulic::CHAR_IMPEDANCE, self.zc);
    }
}
