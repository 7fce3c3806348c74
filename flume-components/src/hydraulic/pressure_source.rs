// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! An ideal pressure source.
//!
//! The source holds its wave variable at the set pressure with zero
//! characteristic impedance, so it delivers any flow without the pressure
//! moving.
//!
//! # Ports
//!
//! This component has:
//!  - One hydraulic power port: `p1`
//!
//! # Parameters
//!
//!  - `p`: the source pressure [Pa]

use flume_engine::component::{BoxedModel, ComponentBase, Model, PortId};
use flume_engine::node::hydraulic;
use flume_engine::parameters::ParameterValue;
use flume_engine::types::{CqsType, SimResult};

pub struct PressureSourceC {
    base: ComponentBase,
    p1: PortId,
    p: f64,
}

impl PressureSourceC {
    pub fn creator() -> BoxedModel {
        let mut base = ComponentBase::new("HydraulicPressureSourceC", CqsType::C);
        let p1 = base.add_power_port("p1", "hydraulic");
        base.register_parameter("p", "Source pressure", "Pa", ParameterValue::Real(1.0e5));
        Box::new(Self { base, p1, p: 1.0e5 })
    }
}

impl Model for PressureSourceC {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        self.p = self.base.parameters().real("p")?;
        self.simulate_one_timestep();
        Ok(())
    }

    fn simulate_one_timestep(&mut self) {
        self.base.write(self.p1, hydraulic::WAVE, self.p);
        self.base.write(self.p1, hydraulic::CHAR_IMPEDANCE, 0.0);
    }
}
