// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Shared set-up for engine-based tests.

use beat_track::test_helpers::create_tracker;

use crate::engine::Engine;

/// Create an [`Engine`] whose trace is written to `traces/<test file>.txt`.
///
/// Use as `let engine = start_test(file!());`.
#[must_use]
pub fn start_test(full_filepath: &str) -> Engine {
    Engine::new(&create_tracker(full_filepath))
}
