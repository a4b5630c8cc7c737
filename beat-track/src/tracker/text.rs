// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

pub use log;

use crate::tracker::{EntityManager, Track};
use crate::{Id, SharedWriter, Writer};

/// A simple text logger to output messages to a Writer.
pub struct TextTracker {
    entity_manager: EntityManager,

    /// Writer to which all _log_ events will be written.
    writer: SharedWriter,
}

impl TextTracker {
    /// Create a new [`TextTracker`] with an [`EntityManager`].
    pub fn new(entity_manager: EntityManager, writer: Writer) -> Self {
        Self {
            entity_manager,
            writer: Rc::new(RefCell::new(writer)),
        }
    }

    fn emit(&self, line: std::fmt::Arguments) {
        if let Err(e) = self.writer.borrow_mut().write_fmt(line) {
            eprintln!("TextTracker: failed to write event: {e}");
        }
    }
}

/// Implementation for each [`Track`] event
impl Track for TextTracker {
    fn unique_id(&self) -> Id {
        self.entity_manager.unique_id()
    }

    fn is_entity_enabled(&self, id: Id, level: log::Level) -> bool {
        self.entity_manager.is_log_enabled_at_level(id, level)
    }

    fn add_entity(&self, id: Id, entity_name: &str) {
        self.entity_manager.add_entity(id, entity_name);
    }

    fn enter(&self, id: Id, object: Id) {
        self.emit(format_args!("{id}: enter {object}\n"));
    }

    fn exit(&self, id: Id, object: Id) {
        self.emit(format_args!("{id}: exit {object}\n"));
    }

    fn create(&self, created_by: Id, id: Id, num_bytes: usize, name: &str) {
        self.emit(format_args!(
            "{created_by}: created {id}, {name}, {num_bytes} bytes\n"
        ));
    }

    fn destroy(&self, destroyed_by: Id, id: Id) {
        self.emit(format_args!("{destroyed_by}: destroyed {id}\n"));
    }

    fn log(&self, id: Id, level: log::Level, msg: std::fmt::Arguments) {
        self.emit(format_args!("{id}:{level}: {msg}\n"));
    }

    fn time(&self, set_by: Id, time_ns: f64) {
        self.entity_manager.set_time(time_ns);
        self.emit(format_args!("{set_by}: set time to {time_ns:.1}ns\n"));
    }

    fn shutdown(&self) {
        if let Err(e) = self.writer.borrow_mut().flush() {
            eprintln!("TextTracker: failed to flush: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A writer that appends to a shared buffer so the output can be checked.
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn log_line_format() {
        let buffer = Rc::new(RefCell::new(Vec::new()));
        let tracker = TextTracker::new(
            EntityManager::new(log::Level::Info),
            Box::new(SharedBuffer(buffer.clone())),
        );
        let id = tracker.unique_id();
        tracker.add_entity(id, "top");
        assert!(tracker.is_entity_enabled(id, log::Level::Info));
        assert!(!tracker.is_entity_enabled(id, log::Level::Debug));

        tracker.log(id, log::Level::Info, format_args!("hello {}", 7));
        tracker.enter(id, Id(42));
        tracker.shutdown();

        let text = String::from_utf8(buffer.borrow().clone()).unwrap();
        assert_eq!(text, format!("{id}:INFO: hello 7\n{id}: enter 42\n"));
    }
}
