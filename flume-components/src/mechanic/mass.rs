// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A translational mass with viscous friction.
//!
//! Solves `M v' + B v = F1 - F2` against the wave variables on both sides
//! using the damped double integrator, so the line impedances enter the
//! damping term and the solution stays explicit.
//!
//! # Ports
//!
//! This component has:
//!  - Two mechanic power ports: `p1`, `p2`
//!
//! # Parameters
//!
//!  - `m`: mass [kg]
//!  - `b`: viscous friction coefficient [N s/m]

use flume_engine::component::{BoxedModel, ComponentBase, Model, PortId};
use flume_engine::node::mechanic;
use flume_engine::numeric::DoubleIntegratorWithDamping;
use flume_engine::parameters::ParameterValue;
use flume_engine::types::{CqsType, SimResult};

pub struct TranslationalMass {
    base: ComponentBase,
    p1: PortId,
    p2: PortId,
    mass: f64,
    damping: f64,
    integrator: DoubleIntegratorWithDamping,
}

impl TranslationalMass {
    pub fn creator() -> BoxedModel {
        let mut base = ComponentBase::new("MechanicTranslationalMass", CqsType::Q);
        let p1 = base.add_power_port("p1", "mechanic");
        let p2 = base.add_power_port("p2", "mechanic");
        base.register_parameter("m", "Mass", "kg", ParameterValue::Real(1.0));
        base.register_parameter(
            "b",
            "Viscous friction coefficient",
            "N s/m",
            ParameterValue::Real(0.0),
        );
        Box::new(Self {
            base,
            p1,
            p2,
            mass: 1.0,
            damping: 0.0,
            integrator: DoubleIntegratorWithDamping::new(),
        })
    }
}

impl Model for TranslationalMass {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        self.mass = self.base.parameters().real("m")?;
        self.damping = self.base.parameters().real("b")?;
        let v0 = self.base.read(self.p2, mechanic::VELOCITY);
        let x0 = self.base.read(self.p2, mechanic::POSITION);
        self.integrator
            .initialize(self.base.timestep(), 0.0, 0.0, x0, v0);
        for port in [self.p1, self.p2] {
            self.base.write(port, mechanic::EQ_MASS, self.mass);
        }
        Ok(())
    }

    fn simulate_one_timestep(&mut self) {
        let c1 = self.base.read(self.p1, mechanic::WAVE);
        let zc1 = self.base.read(self.p1, mechanic::CHAR_IMPEDANCE);
        let c2 = self.base.read(self.p2, mechanic::WAVE);
        let zc2 = self.base.read(self.p2, mechanic::CHAR_IMPEDANCE);

        // The line impedances act as additional viscous damping on v
        self.integrator
            .set_damping((self.damping + zc1 + zc2) / self.mass);
        self.integrator
            .integrate(self.base.time(), (c1 - c2) / self.mass);
        let v2 = self.integrator.value_first();
        let x2 = self.integrator.value_second();
        let v1 = -v2;

        let f1 = c1 + zc1 * v1;
        let f2 = c2 + zc2 * v2;

        self.base.write(self.p1, mechanic::VELOCITY, v1);
        self.base.write(self.p1, mechanic::FORCE, f1);
        self.base.write(self.p1, mechanic::POSITION, -x2);
        self.base.write(self.p2, mechanic::VELOCITY, v2);
        self.base.write(self.p2, mechanic::FORCE, f2);
        self.base.write(self.p2, mechanic::POSITION, x2);
    }
}
