// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! A lock-step, cycle-based simulation engine.
//!
//! Components implement [`Runnable`](crate::traits::Runnable) and are ticked
//! once per cycle by the [`Engine`](crate::engine::Engine). Any state that
//! other components may observe is staged during the tick and published in
//! the resolve phase through a [`Resolve`](crate::traits::Resolve)
//! registered with the [`Clock`](crate::time::clock::Clock).
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use beat_engine::engine::Engine;
//! use beat_engine::run_simulation;
//! use beat_engine::time::clock::ClockTick;
//! use beat_engine::traits::Runnable;
//! use beat_engine::types::SimResult;
//!
//! struct Countdown {
//!     remaining: Cell<u32>,
//! }
//!
//! impl Runnable for Countdown {
//!     fn tick(&self, _now: ClockTick) -> SimResult {
//!         self.remaining.set(self.remaining.get().saturating_sub(1));
//!         Ok(())
//!     }
//!
//!     fn is_idle(&self) -> bool {
//!         self.remaining.get() == 0
//!     }
//! }
//!
//! let engine = Engine::default();
//! let countdown = Rc::new(Countdown { remaining: Cell::new(10) });
//! engine.register(countdown.clone());
//! run_simulation!(engine);
//! assert_eq!(engine.default_clock().tick_now().tick(), 10);
//! ```

pub mod engine;
pub mod test_helpers;
pub mod time;
pub mod traits;
pub mod types;

/// Run a simulation until all components are idle.
///
/// The optional second argument is the error message the run is expected to
/// fail with.
#[macro_export]
macro_rules! run_simulation {
    ($engine:ident) => {
        $engine.run().unwrap();
    };
    ($engine:ident, $expect:expr) => {
        match $engine.run() {
            Ok(()) => panic!("Expected an error!"),
            Err(e) => assert_eq!(format!("{e}").as_str(), $expect),
        }
    };
}
