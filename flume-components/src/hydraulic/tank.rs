// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A dead-ended tank.
//!
//! The ground reference of a hydraulic circuit: it draws no flow, so the
//! pressure at its port is exactly the arriving wave variable. Useful both
//! as a plugged end and as a measurement point.
//!
//! # Ports
//!
//! This component has:
//!  - One hydraulic power port: `p1`

use flume_engine::component::{BoxedModel, ComponentBase, Model, PortId};
use flume_engine::node::hydraulic;
use flume_engine::types::{CqsType, SimResult};

pub struct Tank {
    base: ComponentBase,
    p1: PortId,
}

impl Tank {
    pub fn creator() -> BoxedModel {
        let mut base = ComponentBase::new("HydraulicTank", CqsType::Q);
        let p1 = base.add_power_port("p1", "hydraulic");
        Box::new(Self { base, p1 })
    }
}

impl Model for Tank {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        Ok(())
    }

    fn simulate_one_timestep(&mut self) {
        let c1 = self.base.read(self.p1, hydraulic::WAVE);
        self.base.write(self.p1, hydraulic::FLOW, 0.0);
        self.base.write(self.p1, hydraulic::PRESSURE, c1);
    }
}
