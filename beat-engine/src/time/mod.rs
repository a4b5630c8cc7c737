// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Simulation time.

pub mod clock;
