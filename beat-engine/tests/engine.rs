// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use beat_engine::engine::Engine;
use beat_engine::run_simulation;
use beat_engine::test_helpers::start_test;
use beat_engine::time::clock::{ClockTick, RESOLVE_PHASE, TICK_PHASE};
use beat_engine::traits::{Resolve, Resolver, Runnable};
use beat_engine::types::SimResult;
use beat_engine::sim_error;

/// A value that is only visible to readers once it has been resolved.
struct Staged {
    visible: Cell<u32>,
    pending: Cell<Option<u32>>,
}

impl Resolve for Staged {
    fn resolve(&self) {
        if let Some(v) = self.pending.take() {
            self.visible.set(v);
        }
    }
}

/// Writes the tick number into a [`Staged`] value every tick.
struct Writer {
    engine_clock: beat_engine::time::clock::Clock,
    target: Rc<Staged>,
    limit: u64,
}

impl Runnable for Writer {
    fn tick(&self, now: ClockTick) -> SimResult {
        assert_eq!(now.phase(), TICK_PHASE);
        if now.tick() < self.limit {
            self.target.pending.set(Some(now.tick() as u32 + 1));
            self.engine_clock.add_resolve(self.target.clone());
        }
        Ok(())
    }

    fn is_idle(&self) -> bool {
        self.engine_clock.tick_now().tick() >= self.limit
    }
}

/// Records what it observes of a [`Staged`] value each tick.
struct Reader {
    target: Rc<Staged>,
    seen: RefCell<Vec<u32>>,
}

impl Runnable for Reader {
    fn tick(&self, _now: ClockTick) -> SimResult {
        self.seen.borrow_mut().push(self.target.visible.get());
        Ok(())
    }
}

fn staged() -> Rc<Staged> {
    Rc::new(Staged {
        visible: Cell::new(0),
        pending: Cell::new(None),
    })
}

#[test]
fn updates_visible_next_tick() {
    let engine = start_test(file!());
    let target = staged();
    let writer = Rc::new(Writer {
        engine_clock: engine.default_clock(),
        target: target.clone(),
        limit: 4,
    });
    let reader = Rc::new(Reader {
        target: target.clone(),
        seen: RefCell::new(Vec::new()),
    });

    // Register the reader after the writer: it must still see last tick's value
    engine.register(writer);
    engine.register(reader.clone());
    run_simulation!(engine);

    assert_eq!(*reader.seen.borrow(), vec![0, 1, 2, 3]);
    assert_eq!(target.visible.get(), 4);
}

#[test]
fn run_for_counts_ticks() {
    let engine = start_test(file!());
    engine.run_for(25).unwrap();
    assert_eq!(engine.default_clock().tick_now().tick(), 25);
    approx::assert_relative_eq!(engine.time_now_ns(), 25.0);
}

#[test]
fn slow_clock_time() {
    let tracker = beat_track::test_helpers::create_tracker(file!());
    let engine = Engine::new_with_clock_mhz(&tracker, 500.0);
    engine.run_for(10).unwrap();
    approx::assert_relative_eq!(engine.time_now_ns(), 20.0);
}

#[test]
fn run_until_timeout() {
    let engine = start_test(file!());
    match engine.run_until(|| false, 5) {
        Ok(()) => panic!("Expected an error!"),
        Err(e) => assert_eq!(
            format!("{e}"),
            "Error: Condition not met after 5 ticks (tick 5)"
        ),
    }
}

#[test]
fn run_until_met_early() {
    let engine = start_test(file!());
    let clock = engine.default_clock();
    engine.run_until(|| clock.tick_now().tick() == 3, 100).unwrap();
    assert_eq!(clock.tick_now().tick(), 3);
}

struct NeverIdle;

impl Runnable for NeverIdle {
    fn tick(&self, _now: ClockTick) -> SimResult {
        Ok(())
    }

    fn is_idle(&self) -> bool {
        false
    }
}

#[test]
fn deadlock_reported() {
    let engine = start_test(file!());
    engine.register(Rc::new(NeverIdle));
    engine.set_max_ticks(50);
    run_simulation!(engine, "Error: Condition not met after 50 ticks (tick 50)");
}

struct Failing;

impl Runnable for Failing {
    fn tick(&self, now: ClockTick) -> SimResult {
        if now.tick() == 2 {
            return sim_error!("failed at tick 2");
        }
        Ok(())
    }

    fn is_idle(&self) -> bool {
        false
    }
}

#[test]
fn component_error_stops_run() {
    let engine = start_test(file!());
    engine.register(Rc::new(Failing));
    run_simulation!(engine, "Error: failed at tick 2");
    assert_eq!(engine.default_clock().tick_now().tick(), 2);
}

/// Checks the phase seen by a resolve and chains a second one.
struct Chained {
    clock: beat_engine::time::clock::Clock,
    order: Rc<RefCell<Vec<&'static str>>>,
    first: bool,
}

impl Resolve for Chained {
    fn resolve(&self) {
        assert_eq!(self.clock.tick_now().phase(), RESOLVE_PHASE);
        if self.first {
            self.order.borrow_mut().push("first");
            self.clock.add_resolve(Rc::new(Chained {
                clock: self.clock.clone(),
                order: self.order.clone(),
                first: false,
            }));
        } else {
            self.order.borrow_mut().push("second");
        }
    }
}

#[test]
fn chained_resolves_run_same_tick() {
    let engine = start_test(file!());
    let clock = engine.default_clock();
    let order = Rc::new(RefCell::new(Vec::new()));
    clock.add_resolve(Rc::new(Chained {
        clock: clock.clone(),
        order: order.clone(),
        first: true,
    }));
    assert_eq!(clock.num_pending_resolves(), 1);
    engine.step().unwrap();
    assert_eq!(*order.borrow(), vec!["first", "second"]);
    assert_eq!(clock.num_pending_resolves(), 0);
}
