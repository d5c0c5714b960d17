// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! In-memory tracking for tests.
//!
//! A [`TestTracker`] renders each event to a line of text and keeps it, so a
//! test can assert on exactly what a simulation logged:
//!
//! | Event | Line |
//! |-------|------|
//! | log | `{id}:{LEVEL}: {message}` |
//! | create | `{parent}: created {id}, {path}` |
//! | destroy | `{parent}: destroyed {id}` |
//! | turn | `{id}: set turn {turn}` |

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use regex::Regex;

use crate::{Id, Track};

/// A tracker that records every enabled event as a line of text.
pub struct TestTracker {
    lines: Mutex<Vec<String>>,
    next_id: AtomicU64,
    level: log::Level,
}

impl TestTracker {
    /// Record events at or above `level`. IDs are handed out from
    /// `initial_id` upwards.
    #[must_use]
    pub fn new(initial_id: u64, level: log::Level) -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(initial_id),
            level,
        }
    }

    fn record(&self, line: String) {
        println!("{line}");
        self.lines.lock().unwrap().push(line);
    }

    /// All lines recorded since the last [check_and_clear].
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Number of recorded lines matching the regular expression `pattern`.
    ///
    /// Runs of a sweep log concurrently, so their lines interleave in any
    /// order. Counting is the way to check them.
    #[must_use]
    pub fn count_matching(&self, pattern: &str) -> usize {
        let re = Regex::new(pattern).unwrap();
        let lines = self.lines.lock().unwrap();
        lines.iter().filter(|line| re.is_match(line)).count()
    }
}

impl Track for TestTracker {
    fn unique_id(&self) -> Id {
        Id(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn is_entity_enabled(&self, _id: Id, level: log::Level) -> bool {
        level <= self.level
    }

    fn add_entity(&self, _id: Id, _entity_name: &str) {}

    fn create(&self, created_by: Id, id: Id, name: &str) {
        self.record(format!("{created_by}: created {id}, {name}"));
    }

    fn destroy(&self, destroyed_by: Id, id: Id) {
        self.record(format!("{destroyed_by}: destroyed {id}"));
    }

    fn log(&self, id: Id, level: log::Level, msg: std::fmt::Arguments) {
        self.record(format!("{id}:{level}: {msg}"));
    }

    fn turn(&self, set_by: Id, turn: u64) {
        self.record(format!("{set_by}: set turn {turn}"));
    }

    fn shutdown(&self) {}
}

/// Create a [`TestTracker`] and the same tracker as a [`Tracker`](crate::Tracker).
///
/// The first form records every level, the second only `level` and above.
///
/// ```
/// use offsim_track::{info, test_helpers};
///
/// let (test_tracker, tracker) = offsim_track::test_init!(10, offsim_track::log::Level::Info);
/// let top = offsim_track::entity::toplevel(&tracker, "top");
/// info!(top ; "50 turns");
/// test_helpers::check_and_clear(&test_tracker, &["10:INFO: 50 turns"]);
/// ```
#[macro_export]
macro_rules! test_init {
    ($start_id:expr) => {
        $crate::test_init!($start_id, $crate::log::Level::Trace)
    };
    ($start_id:expr, $level:expr) => {{
        let test_tracker = std::sync::Arc::new($crate::test_helpers::TestTracker::new(
            $start_id, $level,
        ));
        let tracker: $crate::Tracker = test_tracker.clone();
        (test_tracker, tracker)
    }};
}

/// Assert that the lines recorded since the last call match `expected`, one
/// regular expression per line and in order, then forget them.
pub fn check_and_clear(tracker: &TestTracker, expected: &[&str]) {
    let mut lines = tracker.lines.lock().unwrap();
    assert_eq!(
        lines.len(),
        expected.len(),
        "expected {expected:?}, recorded {lines:?}"
    );
    for (pattern, line) in expected.iter().zip(lines.iter()) {
        let re = Regex::new(pattern).unwrap();
        assert!(re.is_match(line), "{line:?} does not match {pattern:?}");
    }
    lines.clear();
}
