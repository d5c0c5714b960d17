// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Reactive threshold policy
//!
//! The threshold doubles after any turn in which an offload request was
//! rejected and halves after a turn in which no flow was offloaded. It never
//! drops below [MIN_THRESHOLD].

use std::sync::Arc;

use offsim_track::debug;
use offsim_track::entity::Entity;

use crate::config::MIN_THRESHOLD;
use crate::controller::{Offload, RuleBudget};
use crate::flow::FlowTable;
use crate::metrics::TurnStats;

pub struct Reactive {
    threshold: u64,
}

impl Reactive {
    #[must_use]
    pub fn new(initial_threshold: u64) -> Self {
        Self {
            threshold: initial_threshold.max(MIN_THRESHOLD),
        }
    }
}

impl Offload for Reactive {
    fn threshold(&self) -> Option<u64> {
        Some(self.threshold)
    }

    fn on_turn_end(
        &mut self,
        entity: &Arc<Entity>,
        stats: &TurnStats,
        _flows: &mut FlowTable,
        _budget: &mut RuleBudget,
    ) {
        let previous = self.threshold;
        if stats.rejected > 0 {
            self.threshold = self.threshold.saturating_mul(2);
        } else if stats.offloaded == 0 {
            self.threshold = (self.threshold / 2).max(MIN_THRESHOLD);
        }

        if self.threshold != previous {
            debug!(entity ; "threshold {previous} -> {}", self.threshold);
        }
    }
}
