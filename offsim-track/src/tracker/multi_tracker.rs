// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use crate::Id;
use crate::tracker::{EntityManager, Track, Tracker};

/// Forwards every event to each tracker that has the emitting entity enabled.
///
/// Used when logging to stdout and to a log file at the same time, each with
/// its own level and filter.
pub struct MultiTracker {
    /// Only allocates IDs so that all trackers see the same ones.
    ids: EntityManager,
    trackers: Vec<Tracker>,
}

impl MultiTracker {
    /// Fan out to `trackers`.
    #[must_use]
    pub fn new(trackers: Vec<Tracker>) -> Self {
        Self {
            ids: EntityManager::new(log::Level::Error),
            trackers,
        }
    }

    fn enabled(&self, id: Id, level: log::Level) -> impl Iterator<Item = &Tracker> {
        self.trackers
            .iter()
            .filter(move |tracker| tracker.is_entity_enabled(id, level))
    }
}

impl Track for MultiTracker {
    fn unique_id(&self) -> Id {
        self.ids.unique_id()
    }

    fn is_entity_enabled(&self, id: Id, level: log::Level) -> bool {
        self.enabled(id, level).next().is_some()
    }

    fn add_entity(&self, id: Id, entity_name: &str) {
        self.trackers
            .iter()
            .for_each(|tracker| tracker.add_entity(id, entity_name));
    }

    fn create(&self, created_by: Id, id: Id, name: &str) {
        self.enabled(id, log::Level::Trace)
            .for_each(|tracker| tracker.create(created_by, id, name));
    }

    fn destroy(&self, destroyed_by: Id, id: Id) {
        self.enabled(id, log::Level::Trace)
            .for_each(|tracker| tracker.destroy(destroyed_by, id));
    }

    fn log(&self, id: Id, level: log::Level, msg: std::fmt::Arguments) {
        self.enabled(id, level)
            .for_each(|tracker| tracker.log(id, level, msg));
    }

    fn turn(&self, set_by: Id, turn: u64) {
        self.enabled(set_by, log::Level::Trace)
            .for_each(|tracker| tracker.turn(set_by, turn));
    }

    fn shutdown(&self) {
        self.trackers.iter().for_each(|tracker| tracker.shutdown());
    }
}
