// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Configuration records for one simulation run.
//!
//! All records derive `serde` traits and default every field so that a
//! configuration file only needs to name the values it changes. The defaults
//! reproduce the reference pipeline:
//!
//! | Parameter | Default |
//! |-----------|---------|
//! | new flows per turn | 750 000 |
//! | packets per turn | 25 000 000 |
//! | slow path capacity | 8 000 000 packets/turn |
//! | offload rule capacity | 200 000 rules/turn |
//! | turns | 50 |
//!
//! [SimConfig::validate] must be called (and is called by
//! [SimulationContext::new](crate::context::SimulationContext::new)) before a
//! configuration is used.

use serde::{Deserialize, Serialize};

use crate::sim_error;
use crate::sketch::{HashParams, MERSENNE_PRIME};
use crate::types::{SimResult, Turn};

/// Smallest threshold any controller may use.
pub const MIN_THRESHOLD: u64 = 2;

/// The complete description of one simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Name of the run, used for the entity hierarchy and the results. The
    /// policy label is used when empty.
    pub name: String,

    /// Number of turns to simulate.
    pub turns: Turn,

    /// Offload decision policy.
    pub policy: PolicyConfig,

    /// Per-turn capacity limits.
    pub limits: Limits,

    /// Synthetic traffic model.
    pub traffic: TrafficConfig,

    /// Constants used to derive latency metrics.
    pub latency: LatencyConfig,

    /// Return packets dropped by the slow path to their flow so that they are
    /// generated again in a later turn. When false they are lost.
    pub drops_retry: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            turns: 50,
            policy: PolicyConfig::default(),
            limits: Limits::default(),
            traffic: TrafficConfig::default(),
            latency: LatencyConfig::default(),
            drops_retry: true,
        }
    }
}

impl SimConfig {
    /// The name used for this run.
    #[must_use]
    pub fn run_name(&self) -> String {
        if self.name.is_empty() {
            self.policy.label()
        } else {
            self.name.clone()
        }
    }

    /// Divide all per-turn rates by `divisor`.
    ///
    /// Used to produce quick, proportionally smaller runs. Rates never drop
    /// below one and the sketch size is capped to the scaled rule capacity.
    pub fn scale_rates(&mut self, divisor: u64) {
        if divisor <= 1 {
            return;
        }
        let scale = |value: u64| (value / divisor).max(1);
        self.limits.new_flows_per_turn = scale(self.limits.new_flows_per_turn);
        self.limits.packets_per_turn = scale(self.limits.packets_per_turn);
        self.limits.slow_path_capacity = scale(self.limits.slow_path_capacity);
        self.limits.offload_rule_capacity = scale(self.limits.offload_rule_capacity);
        if let PolicyConfig::Sketch(sketch) = &mut self.policy {
            sketch.top_k = sketch.top_k.min(self.limits.offload_rule_capacity);
        }
    }

    /// Check that the configuration can be simulated.
    pub fn validate(&self) -> SimResult {
        if self.turns == 0 {
            return sim_error!("turns must be greater than 0");
        }
        self.limits.validate()?;
        self.traffic.validate()?;
        self.latency.validate()?;
        self.policy.validate(&self.limits)
    }
}

/// Hard per-turn limits of the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Nominal number of new flows admitted each turn.
    pub new_flows_per_turn: u64,

    /// Packet budget of one turn (only limits top-up batches).
    pub packets_per_turn: u64,

    /// Packets the slow path processes per turn.
    pub slow_path_capacity: u64,

    /// Offload rules that can be installed per turn.
    pub offload_rule_capacity: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            new_flows_per_turn: 750_000,
            packets_per_turn: 25_000_000,
            slow_path_capacity: 8_000_000,
            offload_rule_capacity: 200_000,
        }
    }
}

impl Limits {
    fn validate(&self) -> SimResult {
        if self.slow_path_capacity == 0 {
            return sim_error!("slow_path_capacity must be greater than 0");
        }
        if self.offload_rule_capacity == 0 {
            return sim_error!("offload_rule_capacity must be greater than 0");
        }
        Ok(())
    }
}

/// One entry of a weighted flow size table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SizeClass {
    /// Flow size in packets.
    pub packets: u32,

    /// Relative weight within its group.
    pub weight: f64,
}

impl SizeClass {
    #[must_use]
    pub fn new(packets: u32, weight: f64) -> Self {
        Self { packets, weight }
    }
}

/// How a new flow's size percentile is chosen.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SizeSampling {
    /// Percentile `(id - 1) mod 100`.
    #[default]
    Cyclic,

    /// Uniform percentile from a seeded generator.
    Seeded { seed: u64 },
}

/// A point at which the new-flow rate changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RampStage {
    /// First turn of this stage.
    pub start_turn: Turn,

    /// Multiplier applied to `new_flows_per_turn`.
    pub multiplier: f64,
}

impl RampStage {
    #[must_use]
    pub fn new(start_turn: Turn, multiplier: f64) -> Self {
        Self {
            start_turn,
            multiplier,
        }
    }
}

/// Schedule that shapes the number of new flows admitted per turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RampSchedule {
    /// Stages sorted by `start_turn`, the first starting at turn 0.
    pub stages: Vec<RampStage>,

    /// Number of turns over which admission grows linearly to its target.
    pub slow_start_turns: Turn,
}

impl Default for RampSchedule {
    fn default() -> Self {
        Self {
            stages: vec![RampStage::new(0, 1.0)],
            slow_start_turns: 0,
        }
    }
}

impl RampSchedule {
    /// The multiplier in force at `turn`.
    #[must_use]
    pub fn multiplier_at(&self, turn: Turn) -> f64 {
        let mut multiplier = self
            .stages
            .iter()
            .take_while(|stage| stage.start_turn <= turn)
            .last()
            .map_or(1.0, |stage| stage.multiplier);

        if turn < self.slow_start_turns {
            multiplier *= f64::from(turn + 1) / f64::from(self.slow_start_turns);
        }
        multiplier
    }

    fn validate(&self) -> SimResult {
        match self.stages.first() {
            None => return sim_error!("ramp schedule needs at least one stage"),
            Some(first) if first.start_turn != 0 => {
                return sim_error!("the first ramp stage must start at turn 0");
            }
            Some(_) => {}
        }
        for pair in self.stages.windows(2) {
            if pair[1].start_turn <= pair[0].start_turn {
                return sim_error!("ramp stages must have increasing start turns");
            }
        }
        if let Some(stage) = self
            .stages
            .iter()
            .find(|s| !s.multiplier.is_finite() || s.multiplier < 0.0)
        {
            return sim_error!(format!(
                "ramp multiplier {} at turn {} must be finite and non-negative",
                stage.multiplier, stage.start_turn
            ));
        }
        Ok(())
    }
}

/// The synthetic traffic model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    /// Batch size used for rat flows.
    pub rat_batch_size: u32,

    /// First batch size of a new elephant when the controller has no
    /// threshold.
    pub elephant_start_batch_size: u32,

    /// Batch size of established elephants.
    pub elephant_batch_size: u32,

    /// A flow with at least this many remaining packets is batched as an
    /// elephant.
    pub elephant_cutoff: u32,

    /// Percentage of new flows drawn from the elephant table.
    pub elephant_percent: f64,

    /// Size table for rat flows.
    pub rat_sizes: Vec<SizeClass>,

    /// Size table for elephant flows.
    pub elephant_sizes: Vec<SizeClass>,

    /// How sizes are sampled.
    pub sampling: SizeSampling,

    /// New-flow ramp schedule.
    pub ramp: RampSchedule,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            rat_batch_size: 4,
            elephant_start_batch_size: 16,
            elephant_batch_size: 64,
            elephant_cutoff: 32,
            elephant_percent: 20.0,
            rat_sizes: vec![
                SizeClass::new(2, 40.0),
                SizeClass::new(4, 30.0),
                SizeClass::new(8, 20.0),
                SizeClass::new(16, 10.0),
            ],
            elephant_sizes: vec![
                SizeClass::new(32, 30.0),
                SizeClass::new(64, 25.0),
                SizeClass::new(128, 20.0),
                SizeClass::new(256, 15.0),
                SizeClass::new(512, 10.0),
            ],
            sampling: SizeSampling::default(),
            ramp: RampSchedule::default(),
        }
    }
}

impl TrafficConfig {
    fn validate(&self) -> SimResult {
        if self.rat_batch_size == 0
            || self.elephant_start_batch_size == 0
            || self.elephant_batch_size == 0
        {
            return sim_error!("batch sizes must be greater than 0");
        }
        if !(0.0..=100.0).contains(&self.elephant_percent) {
            return sim_error!(format!(
                "elephant_percent {} must be within 0..=100",
                self.elephant_percent
            ));
        }
        validate_sizes("rat_sizes", &self.rat_sizes)?;
        validate_sizes("elephant_sizes", &self.elephant_sizes)?;
        self.ramp.validate()
    }
}

fn validate_sizes(name: &str, sizes: &[SizeClass]) -> SimResult {
    if sizes.is_empty() {
        return sim_error!(format!("{name} must not be empty"));
    }
    for class in sizes {
        if class.packets == 0 {
            return sim_error!(format!("{name} contains a flow size of 0"));
        }
        if !class.weight.is_finite() || class.weight <= 0.0 {
            return sim_error!(format!(
                "{name} weight for size {} must be positive",
                class.packets
            ));
        }
    }
    Ok(())
}

/// Constants used to turn packet counts into latency figures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Latency of a packet processed on the fast path.
    pub fast_path_us: f64,

    /// Latency of a packet processed on (or dropped by) the slow path.
    pub slow_path_us: f64,

    /// Completion time credited to flows finishing in their creation turn.
    pub min_completion_secs: f64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            fast_path_us: 10.0,
            slow_path_us: 80.0,
            min_completion_secs: 0.5,
        }
    }
}

impl LatencyConfig {
    fn validate(&self) -> SimResult {
        let values = [
            self.fast_path_us,
            self.slow_path_us,
            self.min_completion_secs,
        ];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return sim_error!("latency constants must be finite and non-negative");
        }
        Ok(())
    }
}

/// Which rejection count the proportional controller feeds back.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionSample {
    /// Rejections of the turn that just ended.
    #[default]
    Current,

    /// Rejections of the turn before that.
    Previous,
}

/// Parameters of the proportional feedback controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProportionalConfig {
    pub initial_threshold: u64,

    /// Gain applied to the rule utilisation error.
    pub alpha: f64,

    /// Target rule utilisation.
    pub omega: f64,

    pub rejection_sample: RejectionSample,
}

impl Default for ProportionalConfig {
    fn default() -> Self {
        Self {
            initial_threshold: 16,
            alpha: 1.0,
            omega: 0.8,
            rejection_sample: RejectionSample::default(),
        }
    }
}

/// Parameters of the sketch-based controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SketchConfig {
    /// Number of heavy hitters offloaded.
    pub top_k: u64,

    /// Number of hash functions (H).
    pub hashes: usize,

    /// Counter slots per hash function (S).
    pub slots: usize,

    /// Sub-counters per slot (W).
    pub windows: usize,

    /// Turns between offload set rebuilds (R).
    pub replacement_turns: Turn,

    /// Smallest estimate that makes a flow a heavy hitter candidate.
    pub min_estimate: u64,

    /// Seed used to derive the hash parameters.
    pub seed: u64,

    /// Explicit hash parameters, one per hash function. Overrides `seed`.
    pub hash_params: Option<Vec<HashParams>>,
}

impl Default for SketchConfig {
    fn default() -> Self {
        Self {
            top_k: 20_000,
            hashes: 4,
            slots: 1 << 18,
            windows: 4,
            replacement_turns: 1,
            min_estimate: 32,
            seed: 0x5eed,
            hash_params: None,
        }
    }
}

impl SketchConfig {
    fn validate(&self, limits: &Limits) -> SimResult {
        if self.top_k == 0 || self.hashes == 0 || self.slots == 0 || self.windows == 0 {
            return sim_error!("sketch dimensions must be greater than 0");
        }
        if self.replacement_turns == 0 {
            return sim_error!("replacement_turns must be greater than 0");
        }
        if self.top_k > limits.offload_rule_capacity {
            return sim_error!(format!(
                "top_k {} exceeds offload_rule_capacity {}",
                self.top_k, limits.offload_rule_capacity
            ));
        }
        if let Some(params) = &self.hash_params {
            if params.len() != self.hashes {
                return sim_error!(format!(
                    "{} hash parameters given for {} hashes",
                    params.len(),
                    self.hashes
                ));
            }
            if params
                .iter()
                .any(|p| p.multiplier == 0 || p.multiplier >= MERSENNE_PRIME || p.increment >= MERSENNE_PRIME)
            {
                return sim_error!("hash parameters must be within the prime field");
            }
        }
        Ok(())
    }
}

/// Selects and parameterises the offload controller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Fixed threshold. `None` disables offloading.
    Static { threshold: Option<u64> },

    /// Threshold doubled on rejections and halved when idle.
    Reactive { initial_threshold: u64 },

    /// Threshold scaled by rule utilisation and drops.
    Proportional(ProportionalConfig),

    /// Offload the heavy hitters found by a sketch.
    Sketch(SketchConfig),
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::Static {
            threshold: Some(16),
        }
    }
}

impl PolicyConfig {
    /// Short label naming the policy and its main parameter.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Static {
                threshold: Some(threshold),
            } => format!("static-{threshold}"),
            Self::Static { threshold: None } => "static-off".to_string(),
            Self::Reactive { .. } => "reactive".to_string(),
            Self::Proportional(_) => "proportional".to_string(),
            Self::Sketch(config) => format!("sketch-k{}", config.top_k),
        }
    }

    fn validate(&self, limits: &Limits) -> SimResult {
        let threshold = match self {
            Self::Static { threshold } => *threshold,
            Self::Reactive { initial_threshold } => Some(*initial_threshold),
            Self::Proportional(config) => {
                if !config.alpha.is_finite() || !config.omega.is_finite() {
                    return sim_error!("proportional gains must be finite");
                }
                Some(config.initial_threshold)
            }
            Self::Sketch(config) => return config.validate(limits),
        };
        match threshold {
            Some(threshold) if threshold < MIN_THRESHOLD => sim_error!(format!(
                "threshold {threshold} must be at least {MIN_THRESHOLD}"
            )),
            _ => Ok(()),
        }
    }
}
