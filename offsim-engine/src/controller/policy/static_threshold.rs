// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Fixed threshold policy

use std::sync::Arc;

use offsim_track::entity::Entity;

use crate::controller::{Offload, RuleBudget};
use crate::flow::FlowTable;
use crate::metrics::TurnStats;

pub struct StaticThreshold {
    threshold: Option<u64>,
}

impl StaticThreshold {
    #[must_use]
    pub fn new(threshold: Option<u64>) -> Self {
        Self { threshold }
    }
}

impl Offload for StaticThreshold {
    fn threshold(&self) -> Option<u64> {
        self.threshold
    }

    fn on_turn_end(
        &mut self,
        _entity: &Arc<Entity>,
        _stats: &TurnStats,
        _flows: &mut FlowTable,
        _budget: &mut RuleBudget,
    ) {
    }
}
