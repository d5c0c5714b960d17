// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Sweep offload policies over the dual path pipeline simulation.
//!
//! The base [SimConfig] is built from several layers, each overriding the
//! last:
//!  1. the built-in defaults,
//!  2. an optional TOML configuration file,
//!  3. environment variables prefixed with `OFFSIM_` (nested fields are
//!     separated by `__`, e.g. `OFFSIM_LIMITS__SLOW_PATH_CAPACITY=1000`),
//!  4. command-line options.
//!
//! The sweep then contains one run per static threshold plus one run for each
//! adaptive policy requested.

use std::path::Path;

use clap::ValueEnum;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use itertools::Itertools;
use offsim_engine::config::{PolicyConfig, ProportionalConfig, SimConfig, SketchConfig};
use offsim_engine::metrics::RunSummary;
use offsim_engine::sim_error;
use offsim_engine::types::{SimError, Turn};

/// Prefix of environment variables that override configuration values.
pub const ENV_PREFIX: &str = "OFFSIM_";

/// Initial threshold used by adaptive policies not configured by the user.
const DEFAULT_INITIAL_THRESHOLD: u64 = 16;

/// Load the base configuration from defaults, `conf_file` and the
/// environment.
pub fn load_config(conf_file: Option<&Path>) -> Result<SimConfig, SimError> {
    let mut figment = Figment::new().merge(Serialized::defaults(SimConfig::default()));
    if let Some(conf_file) = conf_file {
        if !conf_file.exists() {
            return sim_error!(format!(
                "configuration file {} not found",
                conf_file.display()
            ));
        }
        figment = figment.merge(Toml::file(conf_file));
    }
    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| SimError(format!("invalid configuration: {e}")))
}

/// Offload policy families that can be swept.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum PolicyKind {
    /// One run per static threshold.
    Static,
    Reactive,
    Proportional,
    Sketch,
}

/// Command-line choices that shape the sweep.
#[derive(Clone, Debug)]
pub struct SweepOptions {
    /// Thresholds for the static policy runs. `0` disables offloading.
    pub thresholds: Vec<u64>,
    pub policies: Vec<PolicyKind>,
    pub turns: Option<Turn>,

    /// Divide all per-turn rates by this value.
    pub scale: u64,
    pub drops_retry: Option<bool>,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            thresholds: vec![2, 4, 8, 16, 32, 64],
            policies: vec![
                PolicyKind::Static,
                PolicyKind::Reactive,
                PolicyKind::Proportional,
                PolicyKind::Sketch,
            ],
            turns: None,
            scale: 1,
            drops_retry: None,
        }
    }
}

/// The policy of `kind`, using the parameters of `base` when it is of the
/// same kind.
fn adaptive_policy(kind: PolicyKind, base: &PolicyConfig) -> PolicyConfig {
    match (kind, base) {
        (PolicyKind::Reactive, PolicyConfig::Reactive { .. })
        | (PolicyKind::Proportional, PolicyConfig::Proportional(_))
        | (PolicyKind::Sketch, PolicyConfig::Sketch(_)) => base.clone(),
        (PolicyKind::Reactive, _) => PolicyConfig::Reactive {
            initial_threshold: DEFAULT_INITIAL_THRESHOLD,
        },
        (PolicyKind::Proportional, _) => PolicyConfig::Proportional(ProportionalConfig::default()),
        (PolicyKind::Sketch, _) => PolicyConfig::Sketch(SketchConfig::default()),
        (PolicyKind::Static, _) => base.clone(),
    }
}

/// Expand the base configuration into the configurations of the sweep.
#[must_use]
pub fn build_sweep(base: &SimConfig, options: &SweepOptions) -> Vec<SimConfig> {
    let mut base = base.clone();
    base.name.clear();
    if let Some(turns) = options.turns {
        base.turns = turns;
    }
    if let Some(drops_retry) = options.drops_retry {
        base.drops_retry = drops_retry;
    }

    let mut policies = Vec::new();
    for kind in options.policies.iter().unique() {
        match kind {
            PolicyKind::Static => policies.extend(options.thresholds.iter().map(|t| {
                PolicyConfig::Static {
                    threshold: (*t != 0).then_some(*t),
                }
            })),
            kind => policies.push(adaptive_policy(*kind, &base.policy)),
        }
    }

    policies
        .into_iter()
        .map(|policy| {
            let mut config = SimConfig {
                policy,
                ..base.clone()
            };
            config.scale_rates(options.scale);
            config
        })
        .collect()
}

fn threshold_str(threshold: Option<u64>) -> String {
    threshold.map_or_else(|| "-".to_string(), |t| t.to_string())
}

/// Column titles matching [format_row].
#[must_use]
pub fn format_header() -> String {
    format!(
        "{:<14} {:>8} {:>9} {:>11} {:>9} {:>9} {:>10} {:>10} {:>9}",
        "run", "drop%", "lat(us)", "complete%", "fct(s)", "flows", "offloaded", "rejected", "threshold"
    )
}

/// One line of the results table.
#[must_use]
pub fn format_row(summary: &RunSummary) -> String {
    format!(
        "{:<14} {:>8.3} {:>9.2} {:>11.2} {:>9.3} {:>9} {:>10} {:>10} {:>9}",
        summary.name,
        summary.drop_rate_pct,
        summary.mean_latency_us,
        summary.completion_rate_pct,
        summary.mean_fct_secs,
        summary.flows_created,
        summary.offloaded,
        summary.rejected,
        threshold_str(summary.final_threshold)
    )
}

/// Describe the runs of a sweep on one line.
#[must_use]
pub fn describe_sweep(configs: &[SimConfig]) -> String {
    configs.iter().map(SimConfig::run_name).join(", ")
}
