// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! A turn-based simulator of a packet pipeline split between a
//! capacity-limited slow path and an offload fast path.
//!
//! Each turn represents one second. New flows arrive according to a synthetic
//! size distribution, their packets are routed by the
//! [DualPathDispatcher](dispatcher::DualPathDispatcher) and an offload
//! [controller](controller) decides which flows are moved to the fast path.
//! The slow path drops packets it has no capacity for and only a limited
//! number of offload rules can be installed per turn, so the policy used has a
//! direct effect on drop rate, latency and flow completion time.
//!
//! Policies:
//!  - [StaticThreshold](controller::policy::StaticThreshold): offload once a
//!    flow has sent a fixed number of packets on the slow path.
//!  - [Reactive](controller::policy::Reactive): double or halve the threshold
//!    in response to rejections and idle turns.
//!  - [ProportionalFeedback](controller::policy::ProportionalFeedback): scale
//!    the threshold with rule utilisation and drops.
//!  - [SketchBased](controller::policy::SketchBased): offload the heavy
//!    hitters found by a [HeavyHitterSketch](sketch::HeavyHitterSketch).
//!
//! # Example
//!
//! ```rust
//! use offsim_engine::config::{PolicyConfig, SimConfig};
//! use offsim_engine::engine::Engine;
//! use offsim_track::tracker::dev_null_tracker;
//!
//! let engine = Engine::new(&dev_null_tracker());
//! let mut config = SimConfig {
//!     turns: 5,
//!     policy: PolicyConfig::Reactive { initial_threshold: 8 },
//!     ..Default::default()
//! };
//! config.scale_rates(10_000);
//!
//! let summary = engine.run(config).unwrap();
//! assert_eq!(summary.turns, 5);
//! ```

pub mod clock;
pub mod config;
pub mod context;
pub mod controller;
pub mod dispatcher;
pub mod engine;
pub mod flow;
pub mod metrics;
pub mod sketch;
pub mod test_helpers;
pub mod traffic;
pub mod types;
