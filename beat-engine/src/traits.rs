// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! A set of common traits used across the BEAT engine.

use std::rc::Rc;

use crate::time::clock::ClockTick;
use crate::types::SimResult;

/// The `TotalBytes` trait is used to determine how many bytes an object
/// represents
///
/// This is used to determine how many ticks an object occupies a link for.
pub trait TotalBytes {
    fn total_bytes(&self) -> usize;
}

/// A component that is advanced by the engine once per clock tick.
///
/// All components see the same `now` during a tick. Any state that other
/// components must not observe until the next tick should be staged and
/// published through a [`Resolve`] registered with the clock.
pub trait Runnable {
    /// Advance the component by one tick.
    fn tick(&self, now: ClockTick) -> SimResult;

    /// Returns true when the component has no outstanding work.
    ///
    /// Used by [`Engine::run`](crate::engine::Engine::run) to decide when the
    /// simulation has completed.
    fn is_idle(&self) -> bool {
        true
    }
}

/// Complete any pending transactions.
pub trait Resolve {
    /// Complete any pending update.
    fn resolve(&self);
}

/// A [`Resolver`] is used to register any [`Resolve`] functions that need to be
/// called.
pub trait Resolver {
    fn add_resolve(&self, resolve: Rc<dyn Resolve + 'static>);
}
