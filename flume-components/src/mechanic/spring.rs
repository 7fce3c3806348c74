// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A translational spring.
//!
//! The TLM capacitance of the mechanic domain: the spring stiffness maps
//! onto a characteristic impedance `Zc = k Ts` and the wave update carries
//! the stored force across the step boundary.
//!
//! # Ports
//!
//! This component has:
//!  - Two mechanic power ports: `p1`, `p2`
//!
//! # Parameters
//!
//!  - `k`: spring stiffness [N/m]

use flume_engine::component::{BoxedModel, ComponentBase, Model, PortId};
use flume_engine::node::mechanic;
use flume_engine::parameters::ParameterValue;
use flume_engine::types::{CqsType, SimResult};

pub struct TranslationalSpring {
    base: ComponentBase,
    p1: PortId,
    p2: PortId,
    zc: f64,
}

impl TranslationalSpring {
    pub fn creator() -> BoxedModel {
        let mut base = ComponentBase::new("MechanicTranslationalSpring", CqsType::C);
        let p1 = base.add_power_port("p1", "mechanic");
        let p2 = base.add_power_port("p2", "mechanic");
        base.register_parameter("k", "Spring stiffness", "N/m", ParameterValue::Real(100.0));
        Box::new(Self {
            base,
            p1,
            p2,
            zc: 0.0,
        })
    }
}

impl Model for TranslationalSpring {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        let k = self.base.parameters().real("k")?;
        self.zc = k * self.base.timestep();
        for port in [self.p1, self.p2] {
            let f = self.base.read(port, mechanic::FORCE);
            let v = self.base.read(port, mechanic::VELOCITY);
            self.base.write(port, mechanic::WAVE, f + self.zc * v);
            self.base.write(port, mechanic::CHAR_IMPEDANCE, self.zc);
        }
        Ok(())
    }

    fn simulate_one_timestep(&mut self) {
        let v1 = self.base.read(self.p1, mechanic::VELOCITY);
        let v2 = self.base.read(self.p2, mechanic::VELOCITY);
        let c1 = self.base.read(self.p1, mechanic::WAVE);
        let c2 = self.base.read(self.p2, mechanic::WAVE);

        let c1_new = c2 + 2.0 * self.zc * v2;
        let c2_new = c1 + 2.0 * self.zc * v1;

        self.base.write(self.p1, mechanic::WAVE, c1_new);
        self.base.write(self.p1, mechanic::CHAR_IMPEDANCE, self.zc);
        self.base.write(self.p2, mechanic::WAVE, c2_new);
        self.base.write(self.p2, mechanic::CHAR_IMPEDANCE, self.zc);
    }
}
