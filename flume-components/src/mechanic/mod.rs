// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Translational mechanic components.

pub mod mass;
pub mod spring;
