// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Build the trackers selected on the command line.

use std::fs;
use std::io::{self, BufWriter};
use std::sync::Arc;

use crate::tracker::{EntityManager, MultiTracker, TextTracker, TrackConfigError};
use crate::{Tracker, Writer};

/// Settings of one output.
pub struct TrackerConfig<'a> {
    /// Whether this output is used at all.
    pub enable: bool,

    /// Level of the entities selected by `filter_regex`, or of every entity
    /// when there is no filter.
    pub level: log::Level,

    /// Entities to log at `level`. Empty selects every entity.
    pub filter_regex: &'a str,

    /// Output path, required for the log file.
    pub file: Option<&'a str>,
}

impl Default for TrackerConfig<'_> {
    fn default() -> Self {
        Self {
            enable: true,
            level: log::Level::Warn,
            filter_regex: "",
            file: None,
        }
    }
}

/// Settings of both outputs.
pub struct TrackersConfig<'a> {
    /// Human readable output on the terminal.
    pub stdout: TrackerConfig<'a>,

    /// Text log file.
    pub log_file: TrackerConfig<'a>,
}

/// Entities outside the filter only report errors.
fn text_tracker(config: &TrackerConfig, writer: Writer) -> Result<Tracker, TrackConfigError> {
    let levels = if config.filter_regex.is_empty() {
        EntityManager::new(config.level)
    } else {
        let mut levels = EntityManager::new(log::Level::Error);
        levels.add_entity_level_filter(config.filter_regex, config.level)?;
        levels
    };
    Ok(Arc::new(TextTracker::new(levels, writer)))
}

fn stdout(config: &TrackerConfig) -> Result<Tracker, TrackConfigError> {
    text_tracker(config, Box::new(BufWriter::new(io::stdout())))
}

fn log_file(config: &TrackerConfig) -> Result<Tracker, TrackConfigError> {
    let path = config.file.ok_or_else(|| {
        TrackConfigError("No filename given for the log file tracker".to_string())
    })?;
    let file = fs::File::create(path)
        .map_err(|e| TrackConfigError(format!("Unable to create {path}: {e}")))?;
    text_tracker(config, Box::new(BufWriter::new(file)))
}

/// The tracker for the enabled outputs. With neither enabled, warnings still
/// go to stdout.
pub fn setup_trackers(config: &TrackersConfig) -> Result<Tracker, TrackConfigError> {
    match (config.stdout.enable, config.log_file.enable) {
        (true, true) => Ok(Arc::new(MultiTracker::new(vec![
            stdout(&config.stdout)?,
            log_file(&config.log_file)?,
        ]))),
        (true, false) => stdout(&config.stdout),
        (false, true) => log_file(&config.log_file),
        (false, false) => stdout(&TrackerConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::toplevel;
    use crate::info;

    #[test]
    fn log_file_receives_filtered_messages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.log");
        let path_str = path.to_str().unwrap();

        let config = TrackersConfig {
            stdout: TrackerConfig {
                enable: false,
                ..Default::default()
            },
            log_file: TrackerConfig {
                enable: true,
                level: log::Level::Info,
                filter_regex: "top::keep.*",
                file: Some(path_str),
            },
        };
        let tracker = setup_trackers(&config).unwrap();
        let top = toplevel(&tracker, "top");
        let keep = crate::entity::Entity::new(&top, "keep");
        let skip = crate::entity::Entity::new(&top, "skip");
        info!(keep ; "kept");
        info!(skip ; "skipped");
        tracker.shutdown();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("kept"));
        assert!(!contents.contains("skipped"));
    }

    #[test]
    fn missing_log_file_name() {
        let config = TrackersConfig {
            stdout: TrackerConfig {
                enable: false,
                ..Default::default()
            },
            log_file: TrackerConfig {
                enable: true,
                ..Default::default()
            },
        };
        assert!(setup_trackers(&config).is_err());
    }

    #[test]
    fn bad_filter_regex() {
        let config = TrackersConfig {
            stdout: TrackerConfig {
                filter_regex: "[",
                ..Default::default()
            },
            log_file: TrackerConfig {
                enable: false,
                ..Default::default()
            },
        };
        assert!(setup_trackers(&config).is_err());
    }
}
