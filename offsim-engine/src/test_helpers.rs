// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! A set of common functions used by the tests.

use std::fs;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use offsim_track::Tracker;
use offsim_track::tracker::{EntityManager, TextTracker};

use crate::config::{Limits, SimConfig, SizeClass, TrafficConfig};
use crate::engine::Engine;

/// Create a tracker that writes to a log file named after the test.
///
/// The file is created in a `traces` folder next to the running test binary's
/// working directory.
#[must_use]
pub fn create_tracker(test_file: &str) -> Tracker {
    let stem = Path::new(test_file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("test");

    fs::create_dir_all("traces").unwrap();
    let trace_file = format!("traces/{stem}.log");
    let file = fs::File::create(trace_file).unwrap();
    let entity_manager = EntityManager::new(log::Level::Debug);
    Arc::new(TextTracker::new(entity_manager, Box::new(BufWriter::new(file))))
}

/// Create an engine for a test.
#[must_use]
pub fn start_test(test_file: &str) -> Engine {
    let tracker = create_tracker(test_file);
    Engine::new(&tracker)
}

/// A small configuration that runs quickly.
#[must_use]
pub fn small_config(turns: u32) -> SimConfig {
    SimConfig {
        turns,
        limits: Limits {
            new_flows_per_turn: 750,
            packets_per_turn: 25_000,
            slow_path_capacity: 8_000,
            offload_rule_capacity: 200,
        },
        ..Default::default()
    }
}

/// Traffic made of flows of a single size.
#[must_use]
pub fn single_size_traffic(packets: u32, elephant: bool) -> TrafficConfig {
    let sizes = vec![SizeClass::new(packets, 1.0)];
    TrafficConfig {
        rat_sizes: sizes.clone(),
        elephant_sizes: sizes,
        elephant_percent: if elephant { 100.0 } else { 0.0 },
        ..Default::default()
    }
}
