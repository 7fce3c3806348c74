// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Signal-domain (S) components.

pub mod gain;
pub mod sink;
pub mod source;
pub mod step;
pub mod sum;
