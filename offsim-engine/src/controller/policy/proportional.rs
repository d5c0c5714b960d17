// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Proportional feedback policy
//!
//! At the end of each turn the threshold is scaled by `2^e` where
//!
//! ```text
//! e = alpha * (offloaded * (cap + rejected) / cap^2 - omega) - dropped / slow_cap
//! ```
//!
//! `cap` is the offload rule capacity and `slow_cap` the slow path capacity.
//! Rule utilisation above `omega` raises the threshold, spare rule capacity
//! and slow path drops lower it.

use std::sync::Arc;

use offsim_track::debug;
use offsim_track::entity::Entity;

use crate::config::{Limits, MIN_THRESHOLD, ProportionalConfig, RejectionSample};
use crate::controller::{Offload, RuleBudget};
use crate::flow::FlowTable;
use crate::metrics::TurnStats;

/// Keeps the threshold representable once rounded.
const MAX_THRESHOLD: f64 = u32::MAX as f64;

pub struct ProportionalFeedback {
    threshold: f64,
    alpha: f64,
    omega: f64,
    rejection_sample: RejectionSample,
    previous_rejected: u64,
    rule_capacity: f64,
    slow_path_capacity: f64,
}

impl ProportionalFeedback {
    #[must_use]
    pub fn new(config: &ProportionalConfig, limits: &Limits) -> Self {
        Self {
            threshold: (config.initial_threshold.max(MIN_THRESHOLD)) as f64,
            alpha: config.alpha,
            omega: config.omega,
            rejection_sample: config.rejection_sample,
            previous_rejected: 0,
            rule_capacity: limits.offload_rule_capacity as f64,
            slow_path_capacity: limits.slow_path_capacity as f64,
        }
    }

    fn exponent(&self, offloaded: u64, rejected: u64, dropped: u64) -> f64 {
        let cap = self.rule_capacity;
        let utilisation = offloaded as f64 * (cap + rejected as f64) / (cap * cap);
        self.alpha * (utilisation - self.omega) - dropped as f64 / self.slow_path_capacity
    }
}

impl Offload for ProportionalFeedback {
    fn threshold(&self) -> Option<u64> {
        Some(self.threshold.round() as u64)
    }

    fn on_turn_end(
        &mut self,
        entity: &Arc<Entity>,
        stats: &TurnStats,
        _flows: &mut FlowTable,
        _budget: &mut RuleBudget,
    ) {
        let rejected = match self.rejection_sample {
            RejectionSample::Current => stats.rejected,
            RejectionSample::Previous => self.previous_rejected,
        };
        self.previous_rejected = stats.rejected;

        let exponent = self.exponent(stats.offloaded, rejected, stats.dropped);
        let previous = self.threshold;
        self.threshold = (self.threshold * exponent.exp2()).clamp(MIN_THRESHOLD as f64, MAX_THRESHOLD);

        debug!(entity ; "threshold {previous:.2} -> {:.2} (exponent {exponent:.3})", self.threshold);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use offsim_track::entity::toplevel;
    use offsim_track::tracker::dev_null_tracker;

    use super::*;

    fn limits() -> Limits {
        Limits {
            offload_rule_capacity: 100,
            slow_path_capacity: 1000,
            ..Default::default()
        }
    }

    fn policy(omega: f64, rejection_sample: RejectionSample) -> ProportionalFeedback {
        let config = ProportionalConfig {
            initial_threshold: 16,
            alpha: 1.0,
            omega,
            rejection_sample,
        };
        ProportionalFeedback::new(&config, &limits())
    }

    fn end_turn(policy: &mut ProportionalFeedback, offloaded: u64, rejected: u64, dropped: u64) {
        let top = toplevel(&dev_null_tracker(), "top");
        let stats = TurnStats {
            offloaded,
            rejected,
            dropped,
            ..Default::default()
        };
        policy.on_turn_end(&top, &stats, &mut FlowTable::new(), &mut RuleBudget::new(100));
    }

    #[test]
    fn saturated_rules_raise_threshold() {
        let mut policy = policy(0.0, RejectionSample::Current);
        end_turn(&mut policy, 100, 0, 0);
        assert_eq!(policy.threshold(), Some(32));
    }

    #[test]
    fn drops_lower_threshold() {
        let mut policy = policy(0.0, RejectionSample::Current);
        end_turn(&mut policy, 0, 0, 1000);
        assert_eq!(policy.threshold(), Some(8));
    }

    #[test]
    fn partial_exponent() {
        let mut policy = policy(0.5, RejectionSample::Current);
        end_turn(&mut policy, 100, 0, 0);
        assert_relative_eq!(policy.threshold, 16.0 * 2f64.sqrt(), max_relative = 1e-12);
        assert_eq!(policy.threshold(), Some(23));
    }

    #[test]
    fn never_below_floor() {
        let mut policy = policy(0.8, RejectionSample::Current);
        for _ in 0..50 {
            end_turn(&mut policy, 0, 0, 500);
        }
        assert_eq!(policy.threshold(), Some(MIN_THRESHOLD));
    }

    #[test]
    fn rejections_sampled_from_previous_turn() {
        let mut current = policy(0.0, RejectionSample::Current);
        let mut previous = policy(0.0, RejectionSample::Previous);

        // 50 rules with 100 rejections: utilisation 0.5 * 2 = 1 when counted
        end_turn(&mut current, 50, 100, 0);
        end_turn(&mut previous, 50, 100, 0);
        assert_eq!(current.threshold(), Some(32));
        assert_relative_eq!(previous.threshold, 16.0 * 2f64.sqrt(), max_relative = 1e-12);

        end_turn(&mut previous, 50, 0, 0);
        assert_relative_eq!(previous.threshold, 32.0 * 2f64.sqrt(), max_relative = 1e-12);
    }
}
