// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The [`Track`] interface and the trackers implementing it.

/// Tracker that discards everything.
pub mod dev_null;
/// Tracker that fans out to several others.
pub mod multi_tracker;
/// Tracker writing text lines.
pub mod text;

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

pub use dev_null::DevNullTracker;
pub use multi_tracker::MultiTracker;
use regex::Regex;
pub use text::TextTracker;

use crate::{Id, ROOT};

/// An invalid tracker configuration, such as a bad filter or log file.
#[derive(Debug)]
pub struct TrackConfigError(pub String);

impl fmt::Display for TrackConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Tracker configuration error: {}", self.0)
    }
}

impl std::error::Error for TrackConfigError {}

/// Receiver of the events emitted by entities.
///
/// Events are only sent once [is_entity_enabled](Track::is_entity_enabled)
/// has returned true for the emitting entity, so implementations do not need
/// to filter again.
pub trait Track {
    /// A new ID, unique for the lifetime of the tracker.
    fn unique_id(&self) -> Id;

    /// Whether entity `id` emits events at `level`.
    fn is_entity_enabled(&self, id: Id, level: log::Level) -> bool;

    /// Register the `::` separated path of entity `id` so that its level can
    /// be resolved.
    fn add_entity(&self, id: Id, entity_name: &str);

    /// Entity `created_obj` was created under `created_by`.
    fn create(&self, created_by: Id, created_obj: Id, name: &str);

    /// Entity `destroyed_obj` was dropped.
    fn destroy(&self, destroyed_by: Id, destroyed_obj: Id);

    /// A formatted message.
    fn log(&self, msg_by: Id, level: log::Level, msg: std::fmt::Arguments);

    /// The clock owned by `set_by` moved on to `turn`.
    fn turn(&self, set_by: Id, turn: u64);

    /// Flush any buffered output.
    fn shutdown(&self);
}

/// A shared [`Track`] implementation.
///
/// The runs of a sweep execute on several threads and all log through the
/// same tracker.
pub type Tracker = Arc<dyn Track + Send + Sync>;

/// A [`Tracker`] writing every event at or above `level` to `stdout`.
#[must_use]
pub fn stdout_tracker(level: log::Level) -> Tracker {
    let writer = Box::new(io::BufWriter::new(io::stdout()));
    Arc::new(TextTracker::new(EntityManager::new(level), writer))
}

/// A [`Tracker`] that drops every event.
#[must_use]
pub fn dev_null_tracker() -> Tracker {
    Arc::new(DevNullTracker)
}

/// Gives matching entities a different level from the default.
struct LevelFilter {
    regex: Regex,
    level: log::Level,
}

/// Resolves the level of each entity and hands out IDs.
///
/// Entities get the level of the first filter matching their path, or the
/// default level. Only entities whose level differs from the default are
/// remembered.
pub struct EntityManager {
    default_level: log::Level,
    filters: Vec<LevelFilter>,
    next_id: AtomicU64,
    overrides: RwLock<HashMap<Id, log::Level>>,
}

impl EntityManager {
    /// A manager with no filters, so every entity is at `default_level`.
    #[must_use]
    pub fn new(default_level: log::Level) -> Self {
        Self {
            default_level,
            filters: Vec::new(),
            next_id: AtomicU64::new(ROOT.0 + 1),
            overrides: RwLock::new(HashMap::new()),
        }
    }

    fn unique_id(&self) -> Id {
        Id(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn is_log_enabled_at_level(&self, id: Id, level: log::Level) -> bool {
        let overrides = self.overrides.read().unwrap();
        level <= *overrides.get(&id).unwrap_or(&self.default_level)
    }

    fn add_entity(&self, id: Id, path: &str) {
        let level = self.log_level_for(path);
        if level == self.default_level {
            return;
        }
        if self.overrides.write().unwrap().insert(id, level).is_some() {
            panic!("Entity ID {id} registered twice ({path})");
        }
    }

    fn log_level_for(&self, path: &str) -> log::Level {
        self.filters
            .iter()
            .find(|filter| filter.regex.is_match(path))
            .map_or(self.default_level, |filter| filter.level)
    }

    /// Set `level` for entities whose path matches `regex_str`.
    ///
    /// Filters are tried in the order they were added.
    ///
    /// ```rust
    /// use offsim_track::log::Level;
    /// use offsim_track::tracker::EntityManager;
    ///
    /// let mut manager = EntityManager::new(Level::Warn);
    /// manager.add_entity_level_filter(".*::dispatcher", Level::Trace).unwrap();
    /// ```
    pub fn add_entity_level_filter(
        &mut self,
        regex_str: &str,
        level: log::Level,
    ) -> Result<(), TrackConfigError> {
        let regex = Regex::new(regex_str).map_err(|e| {
            TrackConfigError(format!("Failed to parse regex {regex_str}:\n{e}\n"))
        })?;
        self.filters.push(LevelFilter { regex, level });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATHS: [&str; 4] = [
        "top",
        "top::static-4",
        "top::static-4::dispatcher",
        "top::sketch-k200::dispatcher",
    ];

    fn levels(manager: &EntityManager) -> Vec<log::Level> {
        PATHS.iter().map(|p| manager.log_level_for(p)).collect()
    }

    #[test]
    fn default_level_without_filters() {
        let manager = EntityManager::new(log::Level::Error);
        assert_eq!(levels(&manager), vec![log::Level::Error; 4]);
    }

    #[test]
    fn dispatchers_filtered() {
        let mut manager = EntityManager::new(log::Level::Error);
        manager
            .add_entity_level_filter(r".*dispatcher", log::Level::Trace)
            .unwrap();

        use log::Level::{Error, Trace};
        assert_eq!(levels(&manager), vec![Error, Error, Trace, Trace]);
    }

    #[test]
    fn earlier_filters_win() {
        let mut manager = EntityManager::new(log::Level::Error);
        manager
            .add_entity_level_filter(r".*static-4::dispatcher", log::Level::Info)
            .unwrap();
        manager
            .add_entity_level_filter(r"top.*", log::Level::Warn)
            .unwrap();

        use log::Level::{Info, Warn};
        assert_eq!(levels(&manager), vec![Warn, Warn, Info, Warn]);
    }

    #[test]
    fn registered_entities_use_their_level() {
        let mut manager = EntityManager::new(log::Level::Warn);
        manager
            .add_entity_level_filter(r".*dispatcher", log::Level::Debug)
            .unwrap();
        manager.add_entity(Id(5), "top::static-4::dispatcher");
        manager.add_entity(Id(6), "top::static-4");

        assert!(manager.is_log_enabled_at_level(Id(5), log::Level::Debug));
        assert!(!manager.is_log_enabled_at_level(Id(5), log::Level::Trace));
        assert!(manager.is_log_enabled_at_level(Id(6), log::Level::Warn));
        assert!(!manager.is_log_enabled_at_level(Id(6), log::Level::Info));
    }

    #[test]
    fn invalid_regex() {
        let mut manager = EntityManager::new(log::Level::Error);
        let err = manager
            .add_entity_level_filter(r"(unclosed", log::Level::Info)
            .unwrap_err();
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn ids_follow_root() {
        let manager = EntityManager::new(log::Level::Error);
        let ids: Vec<_> = (0..3).map(|_| manager.unique_id()).collect();
        assert_eq!(ids, vec![Id(ROOT.0 + 1), Id(ROOT.0 + 2), Id(ROOT.0 + 3)]);
    }
}
