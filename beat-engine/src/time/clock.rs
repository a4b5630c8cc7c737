// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! This module represents the time during a simulation.
//!
//! Time is made up of a cycle count and a phase. Every tick has two phases:
//! [`TICK_PHASE`] during which components run and [`RESOLVE_PHASE`] during
//! which staged updates are published.

use core::cmp::Ordering;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::traits::{Resolve, Resolver};

/// Phase in which components are ticked.
pub const TICK_PHASE: u32 = 0;

/// Phase in which staged updates are resolved.
pub const RESOLVE_PHASE: u32 = 1;

/// ClockTick structure for representing a number of Clock ticks and a phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClockTick {
    /// Clock ticks.
    tick: u64,

    /// Clock phase.
    phase: u32,
}

impl ClockTick {
    #[must_use]
    pub fn new() -> Self {
        Self { tick: 0, phase: 0 }
    }

    /// Get the current clock tick.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Get the current clock phase.
    #[must_use]
    pub fn phase(&self) -> u32 {
        self.phase
    }

    /// Change the default constructor value of `tick`.
    pub fn set_tick(&mut self, tick: u64) -> ClockTick {
        self.tick = tick;
        *self
    }

    /// Change the default constructor value of `phase`.
    pub fn set_phase(&mut self, phase: u32) -> ClockTick {
        self.phase = phase;
        *self
    }
}

impl Default for ClockTick {
    fn default() -> Self {
        Self::new()
    }
}

/// Define the comparison operation for ClockTick.
impl Ord for ClockTick {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.tick.cmp(&other.tick) {
            Ordering::Equal => self.phase.cmp(&other.phase),
            ordering => ordering,
        }
    }
}

impl PartialOrd for ClockTick {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for ClockTick {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}.{:?}", self.tick, self.phase)
    }
}

/// State representing a clock.
#[derive(Clone)]
pub struct Clock {
    /// Frequency of the clock in MHz.
    /// *Note*: Should never be changed as it is registered at this frequency.
    freq_mhz: f64,

    shared_state: Rc<ClockState>,
}

/// Shared state between all copies of a [`Clock`].
struct ClockState {
    now: Cell<ClockTick>,

    /// Registered [`Resolve`] functions.
    to_resolve: RefCell<Vec<Rc<dyn Resolve + 'static>>>,
}

impl Clock {
    /// Create a new [Clock] at the specified frequency.
    #[must_use]
    pub fn new(freq_mhz: f64) -> Self {
        let shared_state = Rc::new(ClockState {
            now: Cell::new(ClockTick::new()),
            to_resolve: RefCell::new(Vec::new()),
        });

        Self {
            freq_mhz,
            shared_state,
        }
    }

    /// Returns the clocks frequency in MHz.
    #[must_use]
    pub fn freq_mhz(&self) -> f64 {
        self.freq_mhz
    }

    /// Returns the current [ClockTick].
    #[must_use]
    pub fn tick_now(&self) -> ClockTick {
        self.shared_state.now.get()
    }

    /// Returns the current time in `ns`.
    #[must_use]
    pub fn time_now_ns(&self) -> f64 {
        self.to_ns(&self.tick_now())
    }

    /// Convert the given [ClockTick] to a time in `ns` for this clock.
    #[must_use]
    pub fn to_ns(&self, clock_time: &ClockTick) -> f64 {
        clock_time.tick as f64 / self.freq_mhz * 1000.0
    }

    /// Number of [`Resolve`] functions waiting for the end of the tick.
    #[must_use]
    pub fn num_pending_resolves(&self) -> usize {
        self.shared_state.to_resolve.borrow().len()
    }

    /// Run all registered [`Resolve`] functions in registration order.
    ///
    /// A [`Resolve`] may register further resolves, which are run in the same
    /// phase.
    pub(crate) fn resolve(&self) {
        let mut now = self.tick_now();
        self.shared_state.now.set(now.set_phase(RESOLVE_PHASE));
        loop {
            let pending: Vec<_> = self.shared_state.to_resolve.borrow_mut().drain(..).collect();
            if pending.is_empty() {
                break;
            }
            for r in pending {
                r.resolve();
            }
        }
    }

    /// Move on to the first phase of the next tick.
    pub(crate) fn advance(&self) {
        let mut now = self.tick_now();
        now.set_tick(now.tick() + 1);
        self.shared_state.now.set(now.set_phase(TICK_PHASE));
    }
}

/// The default clocks is simply to use a 1GHz clock so ticks are 1ns.
impl Default for Clock {
    fn default() -> Self {
        Self::new(1000.0)
    }
}

impl Resolver for Clock {
    fn add_resolve(&self, resolve: Rc<dyn Resolve + 'static>) {
        self.shared_state.to_resolve.borrow_mut().push(resolve);
    }
}
