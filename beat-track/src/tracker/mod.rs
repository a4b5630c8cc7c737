// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! The [`Track`] trait and the trackers that implement it.

/// Include the /dev/null tracker.
pub mod dev_null;
/// Include the stdout and file fan-out tracker.
pub mod tee;
/// Include the text-based tracker.
pub mod text;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::rc::Rc;

pub use dev_null::DevNullTracker;
use regex::Regex;
pub use tee::TeeTracker;
pub use text::TextTracker;

use crate::{Id, ROOT};

/// Error used to return configuration errors
#[derive(Debug)]
pub struct TrackConfigError(pub String);

impl fmt::Display for TrackConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Track configuration error: {}", self.0)
    }
}

impl std::error::Error for TrackConfigError {}

/// This is the interface that is supported by all [`Tracker`]s.
pub trait Track {
    /// Allocate a new global ID
    fn unique_id(&self) -> Id;

    /// Determine whether tracking is enabled, and at what level for an
    /// entity looked up by its ID.
    fn is_entity_enabled(&self, id: Id, level: log::Level) -> bool;

    /// Record an entity being created.
    fn add_entity(&self, id: Id, entity_name: &str);

    /// Track when an object with the given ID arrives.
    fn enter(&self, enter_into: Id, enter_obj: Id);

    /// Track when an object with the given ID leaves.
    fn exit(&self, exit_from: Id, exit_obj: Id);

    /// Track when an object with the given ID is created.
    fn create(&self, created_by: Id, created_obj: Id, num_bytes: usize, name: &str);

    /// Track when an entity with the given ID is destroyed.
    fn destroy(&self, destroyed_by: Id, destroyed_obj: Id);

    /// Track a log message of the given level.
    fn log(&self, msg_by: Id, level: log::Level, msg: std::fmt::Arguments);

    /// Advance the time to the time specified in `ns`.
    fn time(&self, set_by: Id, time_ns: f64);

    /// Perform any pre-exit shutdown/cleanup
    fn shutdown(&self);
}

/// The type of a [`Tracker`] that is shared across entities.
pub type Tracker = Rc<dyn Track>;

/// Create a [`Tracker`] that prints all track events to `stdout`.
#[must_use]
pub fn stdout_tracker(level: log::Level) -> Tracker {
    let entity_manager = EntityManager::new(level);
    let stdout_writer = Box::new(std::io::BufWriter::new(io::stdout()));
    let tracker: Tracker = Rc::new(TextTracker::new(entity_manager, stdout_writer));
    tracker
}

/// Create a [`Tracker`] that suppresses all track events.
#[must_use]
pub fn dev_null_tracker() -> Tracker {
    let tracer: Tracker = Rc::new(DevNullTracker {});
    tracer
}

/// The [`EntityManager`] is responsible for determining entity log / trace
/// enable states.
///
/// This manager is also used to allocate unique [`Id`] values.
pub struct EntityManager {
    /// Level of tracking events to output.
    default_entity_level: log::Level,

    /// List of regular expressions mapping entity names to log levels.
    regex_to_entity_level: Vec<(Regex, log::Level)>,

    /// Used to assign unique IDs.
    unique_id: RefCell<u64>,

    /// Keep track of the current time.
    current_time: RefCell<f64>,

    /// Keep track of entities that have levels different to the default.
    log_entity_lookup: RefCell<HashMap<Id, log::Level>>,
}

impl EntityManager {
    /// Constructor with default [`log::Level`]
    #[must_use]
    pub fn new(default_entity_level: log::Level) -> Self {
        Self {
            default_entity_level,
            regex_to_entity_level: Vec::new(),
            unique_id: RefCell::new(ROOT.0 + 1),
            current_time: RefCell::new(0.0),
            log_entity_lookup: RefCell::new(HashMap::new()),
        }
    }

    fn unique_id(&self) -> Id {
        let mut guard = self.unique_id.borrow_mut();
        let id = *guard;
        *guard += 1;
        Id(id)
    }

    fn is_log_enabled_at_level(&self, id: Id, level: log::Level) -> bool {
        match self.log_entity_lookup.borrow().get(&id) {
            None => level <= self.default_entity_level,
            Some(entity_level) => level <= *entity_level,
        }
    }

    fn add_entity(&self, id: Id, entity_name: &str) {
        let entity_level = self.log_level_for(entity_name);
        if entity_level != self.default_entity_level {
            self.log_entity_lookup.borrow_mut().insert(id, entity_level);
        }
    }

    fn log_level_for(&self, entity_name: &str) -> log::Level {
        for (regex, level) in &self.regex_to_entity_level {
            if regex.is_match(entity_name) {
                return *level;
            }
        }
        self.default_entity_level
    }

    /// Add a filter regular expression to set matching entites to a given
    /// level.
    ///
    /// # Example
    ///
    /// ```rust
    /// use beat_track::tracker::EntityManager;
    /// let mut manager = EntityManager::new(log::Level::Warn);
    /// manager.add_entity_level_filter(".*arb.*", log::Level::Trace).unwrap();
    /// ```
    pub fn add_entity_level_filter(
        &mut self,
        regex_str: &str,
        level: crate::log::Level,
    ) -> Result<(), TrackConfigError> {
        match Regex::new(regex_str) {
            Ok(regex) => self.regex_to_entity_level.push((regex, level)),
            Err(e) => {
                return Err(TrackConfigError(format!(
                    "Failed to parse regex {regex_str}:\n{e}\n"
                )));
            }
        }
        Ok(())
    }

    /// Return the time most recently set.
    #[must_use]
    pub fn time(&self) -> f64 {
        *self.current_time.borrow()
    }

    fn set_time(&self, new_time: f64) {
        let mut time_guard = self.current_time.borrow_mut();
        if new_time > *time_guard {
            *time_guard = new_time;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_paths() -> Vec<&'static str> {
        vec!["top", "top::switch", "top::switch::port0", "top::switch::arb1"]
    }

    #[test]
    fn no_filters() {
        let manager = EntityManager::new(log::Level::Error);

        for p in entity_paths() {
            assert_eq!(manager.log_level_for(p), log::Level::Error);
        }
    }

    #[test]
    fn filter_port0_trace() {
        let mut manager = EntityManager::new(log::Level::Error);
        manager
            .add_entity_level_filter(r".*port0", log::Level::Trace)
            .unwrap();

        let expected_levels = [
            log::Level::Error,
            log::Level::Error,
            log::Level::Trace,
            log::Level::Error,
        ];

        for (i, p) in entity_paths().iter().enumerate() {
            assert_eq!(manager.log_level_for(p), expected_levels[i]);
        }
    }

    #[test]
    fn first_filter_wins() {
        let mut manager = EntityManager::new(log::Level::Error);
        // The first pattern seen should be highest priority
        manager
            .add_entity_level_filter(r".*arb1", log::Level::Info)
            .unwrap();
        manager
            .add_entity_level_filter(r".*switch.*", log::Level::Trace)
            .unwrap();
        manager
            .add_entity_level_filter(r"top.*", log::Level::Warn)
            .unwrap();

        let expected_levels = [
            log::Level::Warn,
            log::Level::Trace,
            log::Level::Trace,
            log::Level::Info,
        ];

        for (i, p) in entity_paths().iter().enumerate() {
            assert_eq!(manager.log_level_for(p), expected_levels[i]);
        }
    }

    #[test]
    fn levels_by_id() {
        let mut manager = EntityManager::new(log::Level::Warn);
        manager
            .add_entity_level_filter(r".*port0", log::Level::Debug)
            .unwrap();

        let quiet = manager.unique_id();
        manager.add_entity(quiet, "top::switch");
        let noisy = manager.unique_id();
        manager.add_entity(noisy, "top::switch::port0");

        assert!(!manager.is_log_enabled_at_level(quiet, log::Level::Debug));
        assert!(manager.is_log_enabled_at_level(quiet, log::Level::Warn));
        assert!(manager.is_log_enabled_at_level(noisy, log::Level::Debug));
        assert!(!manager.is_log_enabled_at_level(noisy, log::Level::Trace));
    }

    #[test]
    fn bad_regex() {
        let mut manager = EntityManager::new(log::Level::Warn);
        assert!(
            manager
                .add_entity_level_filter(r"port(", log::Level::Trace)
                .is_err()
        );
    }

    #[test]
    fn ids() {
        let manager = EntityManager::new(log::Level::Error);
        for i in 0..10 {
            assert_eq!(manager.unique_id(), Id(i + ROOT.0 + 1));
        }
    }
}
