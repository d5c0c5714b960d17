// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Per-turn counters and the summary of a complete run.

use serde::{Deserialize, Serialize};

use crate::config::LatencyConfig;
use crate::flow::FlowTable;
use crate::types::Turn;

/// What happened during one turn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnStats {
    pub turn: Turn,
    pub new_flows: u64,
    pub generated: u64,
    pub slow_path: u64,
    pub fast_path: u64,
    pub dropped: u64,

    /// Offload rules installed.
    pub offloaded: u64,

    /// Offload requests refused because the rule capacity was exhausted.
    pub rejected: u64,

    /// Controller threshold once the turn ended.
    pub threshold: Option<u64>,
}

/// The result of one simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub name: String,
    pub policy: String,
    pub turns: Turn,
    pub flows_created: u64,
    pub flows_completed: u64,
    pub generated: u64,
    pub dropped: u64,
    pub fast_path: u64,
    pub slow_path: u64,
    pub offloaded: u64,
    pub rejected: u64,
    pub drop_rate_pct: f64,
    pub mean_latency_us: f64,
    pub completion_rate_pct: f64,
    pub mean_fct_secs: f64,
    pub final_threshold: Option<u64>,
}

/// `numerator / denominator`, or 0 for an empty denominator.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Collects [TurnStats] and reduces them into a [RunSummary].
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    history: Vec<TurnStats>,
    totals: TurnStats,
}

impl MetricsAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stats: TurnStats) {
        let totals = &mut self.totals;
        totals.turn = stats.turn;
        totals.new_flows += stats.new_flows;
        totals.generated += stats.generated;
        totals.slow_path += stats.slow_path;
        totals.fast_path += stats.fast_path;
        totals.dropped += stats.dropped;
        totals.offloaded += stats.offloaded;
        totals.rejected += stats.rejected;
        totals.threshold = stats.threshold;
        self.history.push(stats);
    }

    /// All turns recorded so far.
    #[must_use]
    pub fn history(&self) -> &[TurnStats] {
        &self.history
    }

    /// Sums over all recorded turns. `threshold` is the latest one.
    #[must_use]
    pub fn totals(&self) -> &TurnStats {
        &self.totals
    }

    #[must_use]
    pub fn summarise(
        &self,
        name: &str,
        policy: &str,
        flows: &FlowTable,
        latency: &LatencyConfig,
    ) -> RunSummary {
        let totals = &self.totals;

        let mut flows_completed = 0u64;
        let mut completion_secs = 0.0;
        for (_, flow) in flows.iter() {
            if let Some(finish) = flow.finish_turn() {
                flows_completed += 1;
                let turns = finish - flow.start_turn();
                completion_secs += if turns == 0 {
                    latency.min_completion_secs
                } else {
                    f64::from(turns)
                };
            }
        }

        let flows_created = flows.len() as u64;
        let fast = totals.fast_path as f64;
        let slow = totals.slow_path as f64;
        let dropped = totals.dropped as f64;

        RunSummary {
            name: name.to_string(),
            policy: policy.to_string(),
            turns: self.history.len() as Turn,
            flows_created,
            flows_completed,
            generated: totals.generated,
            dropped: totals.dropped,
            fast_path: totals.fast_path,
            slow_path: totals.slow_path,
            offloaded: totals.offloaded,
            rejected: totals.rejected,
            drop_rate_pct: 100.0 * ratio(dropped, totals.generated as f64),
            mean_latency_us: ratio(
                fast * latency.fast_path_us + (slow + dropped) * latency.slow_path_us,
                fast + slow + dropped,
            ),
            completion_rate_pct: 100.0 * ratio(flows_completed as f64, flows_created as f64),
            mean_fct_secs: ratio(completion_secs, flows_completed as f64),
            final_threshold: totals.threshold,
        }
    }
}
