// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use crate::Id;
use crate::tracker::{EntityManager, Track, Tracker};

/// Sends every event to both the stdout and the trace-file tracker, each
/// applying its own level filters.
pub struct TeeTracker {
    ids: EntityManager,
    stdout: Tracker,
    file: Tracker,
}

impl TeeTracker {
    /// Combine the two trackers.
    #[must_use]
    pub fn new(stdout: Tracker, file: Tracker) -> Self {
        Self {
            // Only allocates IDs
            ids: EntityManager::new(log::Level::Error),
            stdout,
            file,
        }
    }

    fn both(&self) -> [&Tracker; 2] {
        [&self.stdout, &self.file]
    }

    fn each_enabled(&self, id: Id, level: log::Level, f: impl Fn(&Tracker)) {
        for tracker in self.both() {
            if tracker.is_entity_enabled(id, level) {
                f(tracker);
            }
        }
    }
}

impl Track for TeeTracker {
    fn unique_id(&self) -> Id {
        self.ids.unique_id()
    }

    fn is_entity_enabled(&self, id: Id, level: log::Level) -> bool {
        self.both()
            .iter()
            .any(|tracker| tracker.is_entity_enabled(id, level))
    }

    fn add_entity(&self, id: Id, entity_name: &str) {
        for tracker in self.both() {
            tracker.add_entity(id, entity_name);
        }
    }

    fn enter(&self, id: Id, object: Id) {
        self.each_enabled(id, log::Level::Trace, |t| t.enter(id, object));
    }

    fn exit(&self, id: Id, object: Id) {
        self.each_enabled(id, log::Level::Trace, |t| t.exit(id, object));
    }

    fn create(&self, created_by: Id, id: Id, num_bytes: usize, name: &str) {
        self.each_enabled(created_by, log::Level::Trace, |t| {
            t.create(created_by, id, num_bytes, name);
        });
    }

    fn destroy(&self, destroyed_by: Id, id: Id) {
        self.each_enabled(destroyed_by, log::Level::Trace, |t| {
            t.destroy(destroyed_by, id);
        });
    }

    fn log(&self, id: Id, level: log::Level, msg: std::fmt::Arguments) {
        self.each_enabled(id, level, |t| t.log(id, level, msg));
    }

    fn time(&self, set_by: Id, time_ns: f64) {
        for tracker in self.both() {
            tracker.time(set_by, time_ns);
        }
    }

    fn shutdown(&self) {
        for tracker in self.both() {
            tracker.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::test_helpers::{TestTracker, check_and_clear};

    #[test]
    fn events_reach_both_trackers() {
        let stdout = Rc::new(TestTracker::new(10));
        let file = Rc::new(TestTracker::new(20));
        let tee = TeeTracker::new(stdout.clone(), file.clone());

        tee.log(Id(5), log::Level::Error, format_args!("failed"));
        tee.enter(Id(5), Id(7));
        for tracker in [&stdout, &file] {
            check_and_clear(tracker, &["5:ERROR: failed", "5: 7 entered"]);
        }
    }
}
