// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A laminar orifice.
//!
//! Linear restriction `q = Kc dp`, solved directly against the wave
//! variables so the flow already accounts for the pressure change it
//! causes through the line impedances.
//!
//! # Ports
//!
//! This component has:
//!  - Two hydraulic power ports: `p1`, `p2`
//!
//! # Parameters
//!
//!  - `Kc`: pressure-flow coefficient [m^3/(s Pa)]

use flume_engine::component::{BoxedModel, ComponentBase, Model, PortId};
use flume_engine::node::hydraulic;
use flume_engine::parameters::ParameterValue;
use flume_engine::types::{CqsType, SimResult};

pub struct LaminarOrifice {
    base: ComponentBase,
    p1: PortId,
    p2: PortId,
    kc: f64,
}

impl LaminarOrifice {
    pub fn creator() -> BoxedModel {
        let mut base = ComponentBase::new("HydraulicLaminarOrifice", CqsType::Q);
        let p1 = base.add_power_port("p1", "hydraulic");
        let p2 = base.add_power_port("p2", "hydraulic");
        base.register_parameter(
            "Kc",
            "Pressure-flow coefficient",
            "m^3/(s Pa)",
            ParameterValue::Real(1.0e-11),
        );
        Box::new(Self {
            base,
            p1,
            p2,
            kc: 1.0e-11,
        })
    }
}

impl Model for LaminarOrifice {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        self.kc = self.base.parameters().real("Kc")?;
        Ok(())
    }

    fn simulate_one_timestep(&mut self) {
        let c1 = self.base.read(self.p1, hydraulic::WAVE);
        let zc1 = self.base.read(self.p1, hydraulic::CHAR_IMPEDANCE);
        let c2 = self.base.read(self.p2, hydraulic::WAVE);
        let zc2 = self.base.read(self.p2, hydraulic::CHAR_IMPEDANCE);

        let q2 = self.kc * (c1 - c2) / (1.0 + self.kc * (zc1 + zc2));
        let q1 = -q2;
        let p1 = c1 + q1 * zc1;
        let p2 = c2 + q2 * zc2;

        self.base.write(self.p1, hydraulic::FLOW, q1);
        self.base.write(self.p1, hydraulic::PRESSURE, p1);
        self.base.write(self.p2, hydraulic::FLOW, q2);
        self.base.write(self.p2, hydraulic::PRESSURE, p2);
    }
}
