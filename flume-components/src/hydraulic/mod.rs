// Copyright (c) 2023 Graphcore Ltd. All rights reserved.

//! Hydraulic components.
//!
//! The C components (source, volume, lossless line) write the wave
//! variables and characteristic impedances; the Q components (orifices,
//! tank) solve flow and pressure against them.

pub mod lossless_line;
pub mod multi_pressure_source;
pub mod orifice;
pub mod pressure_source;
pub mod tank;
pub mod turbulent_orifice;
pub mod volume;
