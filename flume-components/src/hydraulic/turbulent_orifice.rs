// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A turbulent orifice.
//!
//! Square-root restriction solved in closed form by the
//! [`TurbulentFlowFunction`].
//!
//! # Ports
//!
//! This component has:
//!  - Two hydraulic power ports: `p1`, `p2`
//!
//! # Parameters
//!
//!  - `Cq`: flow coefficient
//!  - `A`: orifice area [m^2]
//!  - `rho`: oil density [kg/m^3]

use flume_engine::component::{BoxedModel, ComponentBase, Model, PortId};
use flume_engine::node::hydraulic;
use flume_engine::numeric::TurbulentFlowFunction;
use flume_engine::parameters::ParameterValue;
use flume_engine::types::{CqsType, SimResult};

pub struct TurbulentOrifice {
    base: ComponentBase,
    p1: PortId,
    p2: PortId,
    turb: TurbulentFlowFunction,
}

impl TurbulentOrifice {
    pub fn creator() -> BoxedModel {
        let mut base = ComponentBase::new("HydraulicTurbulentOrifice", CqsType::Q);
        let p1 = base.add_power_port("p1", "hydraulic");
        let p2 = base.add_power_port("p2", "hydraulic");
        base.register_parameter("Cq", "Flow coefficient", "-", ParameterValue::Real(0.67));
        base.register_parameter("A", "Orifice area", "m^2", ParameterValue::Real(1.0e-5));
        base.register_parameter("rho", "Oil density", "kg/m^3", ParameterValue::Real(890.0));
        Box::new(Self {
            base,
            p1,
            p2,
            turb: TurbulentFlowFunction::default(),
        })
    }
}

impl Model for TurbulentOrifice {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        let cq = self.base.parameters().real("Cq")?;
        let area = self.base.parameters().real("A")?;
        let rho = self.base.parameters().real("rho")?;
        self.turb.set_flow_coefficient(cq * area * (2.0 / rho).sqrt());
        Ok(())
    }

    fn simulate_one_timestep(&mut self) {
        let c1 = self.base.read(self.p1, hydraulic::WAVE);
        let zc1 = self.base.read(self.p1, hydraulic::CHAR_IMPEDANCE);
        let c2 = self.base.read(self.p2, hydraulic::WAVE);
        let zc2 = self.base.read(self.p2, hydraulic::CHAR_IMPEDANCE);

        let q2 = self.turb.flow(c1, c2, zc1, zc2);
        let q1 = -q2;
        let p1 = c1 + q1 * zc1;
        let p2 = c2 + q2 * zc2;

        self.base.write(self.p1, hydraulic::FLOW, q1);
        self.base.write(self.p1, hydraulic::PRESSURE, p1);
        self.base.write(self.p2, hydraulic::FLOW, q2);
        self.base.write(self.p2, hydraulic::PRESSURE, p2);
    }
}
