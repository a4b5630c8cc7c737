// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The lock-step simulation [`Engine`].
//!
//! Every registered [`Runnable`] component is ticked once per clock tick, in
//! registration order, after which all [`Resolve`](crate::traits::Resolve)
//! functions registered with the clock during that tick are run. Updates
//! staged during a tick are therefore never visible to other components until
//! the following tick.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use beat_track::entity::{Entity, toplevel};
use beat_track::tracker::stdout_tracker;
use beat_track::{Tracker, debug, set_time};

use crate::sim_error;
use crate::time::clock::Clock;
use crate::types::{Component, SimResult};

/// Use a default clock frequency of 1GHz.
const DEFAULT_CLOCK_MHZ: f64 = 1000.0;

/// Number of ticks [`Engine::run`] allows before reporting a deadlock.
pub const DEFAULT_MAX_TICKS: u64 = 10_000_000;

pub struct Engine {
    toplevel: Rc<Entity>,
    tracker: Tracker,
    clock: Clock,
    components: RefCell<Vec<Component>>,
    max_ticks: Cell<u64>,
}

impl Engine {
    /// Create a standalone engine with the default 1GHz clock.
    #[must_use]
    pub fn new(tracker: &Tracker) -> Self {
        Self::new_with_clock_mhz(tracker, DEFAULT_CLOCK_MHZ)
    }

    /// Create an engine whose clock runs at the given frequency.
    #[must_use]
    pub fn new_with_clock_mhz(tracker: &Tracker, freq_mhz: f64) -> Self {
        let toplevel = toplevel(tracker, "top");
        Self {
            toplevel,
            tracker: tracker.clone(),
            clock: Clock::new(freq_mhz),
            components: RefCell::new(Vec::new()),
            max_ticks: Cell::new(DEFAULT_MAX_TICKS),
        }
    }

    /// Register a component to be ticked every clock tick.
    pub fn register(&self, component: Component) {
        self.components.borrow_mut().push(component);
    }

    #[must_use]
    pub fn num_components(&self) -> usize {
        self.components.borrow().len()
    }

    /// Advance the simulation by exactly one tick.
    pub fn step(&self) -> SimResult {
        let now = self.clock.tick_now();
        // Clone the list so that components may register others while ticking
        let components = self.components.borrow().clone();
        for component in &components {
            component.tick(now)?;
        }
        self.clock.resolve();
        self.clock.advance();
        set_time!(self.toplevel ; self.clock.time_now_ns());
        Ok(())
    }

    /// Advance the simulation by `ticks` ticks.
    pub fn run_for(&self, ticks: u64) -> SimResult {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    /// Run until `done` returns true, checking before every tick.
    ///
    /// Returns an error if `done` has not become true within `max_ticks`.
    pub fn run_until(&self, mut done: impl FnMut() -> bool, max_ticks: u64) -> SimResult {
        for _ in 0..max_ticks {
            if done() {
                return Ok(());
            }
            self.step()?;
        }
        if done() {
            return Ok(());
        }
        sim_error!(format!(
            "Condition not met after {max_ticks} ticks (tick {})",
            self.clock.tick_now().tick()
        ))
    }

    /// Change the number of ticks [`Engine::run`] allows.
    pub fn set_max_ticks(&self, max_ticks: u64) {
        self.max_ticks.set(max_ticks);
    }

    /// Run until all registered components are idle.
    ///
    /// Returns an error if that does not happen within the tick limit, which
    /// is how a deadlocked model is reported.
    pub fn run(&self) -> SimResult {
        let components = self.components.borrow().clone();
        let result = self.run_until(
            || components.iter().all(|c| c.is_idle()),
            self.max_ticks.get(),
        );
        debug!(self.toplevel ; "Run finished at tick {}", self.clock.tick_now().tick());
        result
    }

    /// Returns a handle to the engine clock.
    #[must_use]
    pub fn default_clock(&self) -> Clock {
        self.clock.clone()
    }

    #[must_use]
    pub fn time_now_ns(&self) -> f64 {
        self.clock.time_now_ns()
    }

    #[must_use]
    pub fn top(&self) -> &Rc<Entity> {
        &self.toplevel
    }

    #[must_use]
    pub fn tracker(&self) -> Tracker {
        self.tracker.clone()
    }
}

/// Create a default engine that sends [`Track`](beat_track::Track) events to
/// stdout.
///
/// This is provided to keep documentation examples simple with fewer
/// concepts to have to consider at once.
impl Default for Engine {
    fn default() -> Self {
        let tracker = stdout_tracker(log::Level::Warn);
        Self::new(&tracker)
    }
}
