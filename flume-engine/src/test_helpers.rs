// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

use crate::engine::Engine;

#[must_use]
pub fn start_test(full_filepath: &str) -> Engine {
    println!("Starting test {full_filepath}");
    Engine::default()
}
