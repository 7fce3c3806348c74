// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! A signal sink.
//!
//! The sink terminates a signal chain so the node carrying it is kept and
//! logged; the received values are available through the node's log data.
//!
//! # Ports
//!
//! This component has:
//!  - One read port: `in`

use flume_engine::component::{BoxedModel, ComponentBase, Model, PortId};
use flume_engine::node::signal;
use flume_engine::types::{CqsType, Requirement, SimResult};

pub struct SignalSink {
    base: ComponentBase,
    input: PortId,
    last: f64,
    num_read: usize,
}

impl SignalSink {
    pub fn creator() -> BoxedModel {
        let mut base = ComponentBase::new("SignalSink", CqsType::S);
        let input = base.add_read_port("in", "signal", Requirement::Required);
        Box::new(Self {
            base,
            input,
            last: 0.0,
            num_read: 0,
        })
    }

    /// The most recently read value.
    #[must_use]
    pub fn last_value(&self) -> f64 {
        self.last
    }

    /// Number of steps taken since the last initialize.
    #[must_use]
    pub fn num_read(&self) -> usize {
        self.num_read
    }
}

impl Model for SignalSink {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    fn initialize(&mut self) -> SimResult {
        self.last = self.base.read(self.input, signal::VALUE);
        self.num_read = 0;
        Ok(())
    }

    fn simulate_one_timestep(&mut self) {
        self.last = self.base.read(self.input, signal::VALUE);
        self.num_read += 1;
    }
}
