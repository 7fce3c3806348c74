// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A hydraulic volume.
//!
//! The classic TLM capacitance: the volume's compressibility is modelled as
//! a transmission line of one timestep, with a low-pass factor `alpha`
//! damping the wave update.
//!
//! # Ports
//!
//! This component has:
//!  - Two hydraulic power ports: `p1`, `p2`
//!
//! # Parameters
//!
//!  - `V`: volume [m^3]
//!  - `beta_e`: effective bulk modulus [Pa]
//!  - `alpha`: low-pass filter factor for the wave update

use flume_engine::component::{BoxedModel, ComponentBase, Model, PortId};
use flume_engine::node::hydraulic;
use flume_engine::parameters::ParameterValue;
use flume_engine::types::{CqsType, SimResult};
use flume_track::warn;

pub struct Volume {
    base: ComponentBase,
    p1: PortId,
    p2: PortId,
    alpha: f64,
    zc: f64,
}

impl Volume {
    pub fn creator() -> BoxedModel {
        let mut base = ComponentBase::new("HydraulicVolume", CqsType::C);
        let p1 = base.add_power_port("p1", "hydraulic");
        let p2 = base.add_power_port("p2", "hydraulic");
        base.register_parameter("V", "Volume", "m^3", ParameterValue::Real(1.0e-3));
        base.register_parameter(
            "beta_e",
            "Effective bulk modulus",
            "Pa",
            ParameterValue::Real(1.0e9),
        );
        base.register_parameter("alpha", "Low pass filter factor", "-", ParameterValue::Real(0.1));
        Box::new(Self {
            base,
            p1,
            p2,
            alpha: 0.1,
            zc: 0.0,
        })
    }
}

impl Model for Volume {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        let volume = self.base.parameters().real("V")?;
        let beta_e = self.base.parameters().real("beta_e")?;
        self.alpha = self.base.parameters().real("alpha")?;
        if !(0.0..1.0).contains(&self.alpha) {
            warn!(self.base.entity() ;
                "Filter factor alpha = {} is outside [0, 1); expect a noisy wave update", self.alpha);
        }
        self.zc = beta_e / volume * self.base.timestep() / (1.0 - self.alpha);

        // Seed the waves from the start pressures and flows so the first
        // step is in equilibrium
        for port in [self.p1, self.p2] {
            let p = self.base.read(port, hydraulic::PRESSURE);
            let q = self.base.read(port, hydraulic::FLOW);
            self.base.write(port, hydraulic::WAVE, p + self.zc * q);
            self.base.write(port, hydraulic::CHAR_IMPEDANCE, self.zc);
        }
        Ok(())
    }

    fn simulate_one_timestep(&mut self) {
        let q1 = self.base.read(self.p1, hydraulic::FLOW);
        let q2 = self.base.read(self.p2, hydraulic::FLOW);
        let c1 = self.base.read(self.p1, hydraulic::WAVE);
        let c2 = self.base.read(self.p2, hydraulic::WAVE);

        let c10 = c2 + 2.0 * self.zc * q2;
        let c20 = c1 + 2.0 * self.zc * q1;
        let c1_new = self.alpha * c1 + (1.0 - self.alpha) * c10;
        let c2_new = self.alpha * c2 + (1.0 - self.alpha) * c20;

        self.base.write(self.p1, hydraulic::WAVE, c1_new);
        self.base.write(self.p1, hydraulic::CHAR_IMPEDANCE, self.zc);
        self.base.write(self.p2, hydraulic::WAVE, c2_new);
        self.base.write(self.p2, hydraulic::CHAR_IMPEDANCE, self.zc);
    }
}
