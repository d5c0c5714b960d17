// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::tracker::{EntityManager, Track};
use crate::{Id, SharedWriter, Writer};

/// Writes one line per event, in the same format as the
/// [`TestTracker`](crate::test_helpers::TestTracker) records them.
pub struct TextTracker {
    levels: EntityManager,
    out: SharedWriter,
}

impl TextTracker {
    /// Write the events enabled by `levels` to `writer`.
    pub fn new(levels: EntityManager, writer: Writer) -> Self {
        Self {
            levels,
            out: Arc::new(Mutex::new(writer)),
        }
    }

    fn emit(&self, args: std::fmt::Arguments) {
        let mut out = self.out.lock().unwrap();
        // A closed stdout must not bring down a sweep.
        let _ = writeln!(out, "{args}");
    }
}

impl Track for TextTracker {
    fn unique_id(&self) -> Id {
        self.levels.unique_id()
    }

    fn is_entity_enabled(&self, id: Id, level: log::Level) -> bool {
        self.levels.is_log_enabled_at_level(id, level)
    }

    fn add_entity(&self, id: Id, entity_name: &str) {
        self.levels.add_entity(id, entity_name);
    }

    fn create(&self, created_by: Id, id: Id, name: &str) {
        self.emit(format_args!("{created_by}: created {id}, {name}"));
    }

    fn destroy(&self, destroyed_by: Id, id: Id) {
        self.emit(format_args!("{destroyed_by}: destroyed {id}"));
    }

    fn log(&self, id: Id, level: log::Level, msg: std::fmt::Arguments) {
        self.emit(format_args!("{id}:{level}: {msg}"));
    }

    fn turn(&self, set_by: Id, turn: u64) {
        self.emit(format_args!("{set_by}: set turn {turn}"));
    }

    fn shutdown(&self) {
        let _ = self.out.lock().unwrap().flush();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn writes_enabled_messages() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let writer: Writer = Box::new(file.reopen().unwrap());
        let tracker = TextTracker::new(EntityManager::new(log::Level::Info), writer);

        let id = tracker.unique_id();
        tracker.add_entity(id, "top");
        assert!(tracker.is_entity_enabled(id, log::Level::Info));
        assert!(!tracker.is_entity_enabled(id, log::Level::Debug));

        tracker.log(id, log::Level::Info, format_args!("turn {} done", 3));
        tracker.turn(id, 4);
        tracker.shutdown();

        let mut contents = String::new();
        file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "2:INFO: turn 3 done\n2: set turn 4\n");
    }
}
