// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! This module provides helper functions for testing logging output
//!
//! The aim of this module is to provide commonly-used functions that enable the
//! testing of the output that should appear from logging macros.

use std::cell::{Cell, RefCell};
use std::fs;
use std::io::BufWriter;
use std::path::Path;
use std::rc::Rc;

use regex::Regex;

use crate::tracker::{EntityManager, TextTracker};
use crate::{Id, Track, Tracker, Writer};

/// A tracker that keeps track events.
pub struct TestTracker {
    events: RefCell<Vec<String>>,

    unique_id: Cell<u64>,
}

impl TestTracker {
    /// Create a new [`Tracker`](crate::Tracker) for the tests.
    ///
    /// This keeps the track events in memory for checking later.
    #[must_use]
    pub fn new(initial_id: u64) -> Self {
        Self {
            events: RefCell::new(Vec::new()),
            unique_id: Cell::new(initial_id),
        }
    }

    fn add_event(&self, event: String) {
        println!("{event}");
        self.events.borrow_mut().push(event);
    }
}

impl Track for TestTracker {
    fn unique_id(&self) -> Id {
        let id = self.unique_id.get();
        self.unique_id.set(id + 1);
        Id(id)
    }

    fn is_entity_enabled(&self, _id: Id, _level: log::Level) -> bool {
        true
    }

    fn add_entity(&self, _id: Id, _entity_name: &str) {
        // Do nothing
    }

    fn enter(&self, id: Id, item: Id) {
        self.add_event(format!("{id}: {item} entered"));
    }

    fn exit(&self, id: Id, item: Id) {
        self.add_event(format!("{id}: {item} exited"));
    }

    fn create(&self, created_by: Id, id: Id, num_bytes: usize, name: &str) {
        self.add_event(format!(
            "{created_by}: created {id}, {name}, {num_bytes} bytes"
        ));
    }

    fn destroy(&self, destroyed_by: Id, id: Id) {
        self.add_event(format!("{destroyed_by}: destroyed {id}"));
    }

    fn log(&self, id: Id, level: log::Level, msg: std::fmt::Arguments) {
        self.add_event(format!("{id}:{level}: {msg}"));
    }

    fn time(&self, set_by: Id, time_ns: f64) {
        self.add_event(format!("{set_by}: set time {time_ns:.1}ns"));
    }

    fn shutdown(&self) {
        // Do nothing
    }
}

/// Create a [`TestTracker`] and the [`Tracker`] handle to it.
///
/// # Examples
///
/// ```
/// use beat_track::test_helpers;
///
/// let (test_tracker, tracker) = beat_track::test_init!(10);
/// let top = beat_track::entity::toplevel(&tracker, "top");
/// test_helpers::check_and_clear(&test_tracker, &["0: created 10, top, 0 bytes"]);
/// ```
#[macro_export]
macro_rules! test_init {
    ($start_id:expr) => {{
        let test_tracker = std::rc::Rc::new($crate::test_helpers::TestTracker::new($start_id));
        let tracker: $crate::Tracker = test_tracker.clone();
        (test_tracker, tracker)
    }};
}

/// Check and clear the _trace_ and _log_ output
///
/// This function asserts that the logging output lines seen since the start or
/// the last time this function was called match the `expected` regular
/// expressions, then clears the recorded output.
pub fn check_and_clear(tracker: &TestTracker, expected: &[&str]) {
    let mut events = tracker.events.borrow_mut();

    println!("Checking {:?} matches {:?}", expected, *events);

    // Check that there are the same number of strings produced as expected
    assert_eq!(expected.len(), events.len());

    for (i, (log_expect, actual)) in expected.iter().zip(events.iter()).enumerate() {
        let re = Regex::new(log_expect).unwrap();
        println!("Checking {i}: {log_expect:?} matches {actual:?}");
        assert!(re.is_match(actual));
    }

    events.clear();
}

/// Create a tracker that writes all events for a test into `traces/`.
///
/// The trace file is named after the test source file so that the output of
/// a failing test can be inspected afterwards.
#[must_use]
pub fn create_tracker(full_filepath: &str) -> Tracker {
    // Place all trace files in one folder
    const FOLDER: &str = "traces";

    // Create that folder if it doesn't exist yet
    fs::create_dir_all(FOLDER).unwrap();

    let filename_only = Path::new(full_filepath)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap();

    let writer: Writer = Box::new(BufWriter::new(
        fs::File::create(format!("{FOLDER}/{filename_only}.txt")).unwrap(),
    ));

    let entity_manager = EntityManager::new(log::Level::Debug);
    let tracker: Tracker = Rc::new(TextTracker::new(entity_manager, writer));
    tracker
}
