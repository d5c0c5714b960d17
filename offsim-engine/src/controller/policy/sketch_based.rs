// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Heavy hitter policy
//!
//! Every processed packet is counted in a [HeavyHitterSketch]. Every
//! `replacement_turns` turns the offload set is replaced by the sketch's
//! current heavy hitters and the sketch window moves on, so a flow has to stay
//! heavy over the last `windows * replacement_turns` turns to stay offloaded.

use std::collections::HashSet;
use std::sync::Arc;

use offsim_track::entity::Entity;
use offsim_track::{debug, trace};

use crate::config::SketchConfig;
use crate::controller::{Offload, RuleBudget};
use crate::flow::FlowTable;
use crate::metrics::TurnStats;
use crate::sketch::HeavyHitterSketch;
use crate::types::{FlowId, Turn};

pub struct SketchBased {
    sketch: HeavyHitterSketch,
    replacement_turns: Turn,
    offloaded: HashSet<FlowId>,
}

impl SketchBased {
    #[must_use]
    pub fn new(config: &SketchConfig) -> Self {
        Self::with_sketch(HeavyHitterSketch::from_config(config), config.replacement_turns)
    }

    #[must_use]
    pub fn with_sketch(sketch: HeavyHitterSketch, replacement_turns: Turn) -> Self {
        assert!(replacement_turns > 0);
        Self {
            sketch,
            replacement_turns,
            offloaded: HashSet::new(),
        }
    }

    #[must_use]
    pub fn sketch(&self) -> &HeavyHitterSketch {
        &self.sketch
    }

    fn rebuild(&mut self, entity: &Arc<Entity>, flows: &mut FlowTable, budget: &mut RuleBudget) {
        for flow in &self.offloaded {
            flows.get_mut(*flow).is_offloaded = false;
        }

        let mut offloaded = HashSet::with_capacity(self.offloaded.len());
        for flow in self.sketch.heavy_hitters() {
            if !self.offloaded.contains(&flow) && !budget.try_install() {
                trace!(entity ; "reject {flow}");
                continue;
            }
            flows.get_mut(flow).is_offloaded = true;
            offloaded.insert(flow);
        }

        debug!(entity ; "offload set rebuilt: {} flows, {} new", offloaded.len(), budget.installed());
        self.offloaded = offloaded;
    }
}

impl Offload for SketchBased {
    fn threshold(&self) -> Option<u64> {
        None
    }

    fn observe(&mut self, flow: FlowId, packets: u64) {
        self.sketch.update(flow, packets);
    }

    fn on_turn_end(
        &mut self,
        entity: &Arc<Entity>,
        stats: &TurnStats,
        flows: &mut FlowTable,
        budget: &mut RuleBudget,
    ) {
        if (stats.turn + 1) % self.replacement_turns != 0 {
            return;
        }
        self.rebuild(entity, flows, budget);
        self.sketch.rotate();
    }
}

#[cfg(test)]
mod tests {
    use offsim_track::entity::toplevel;
    use offsim_track::tracker::dev_null_tracker;

    use super::*;
    use crate::sketch::HashParams;

    fn end_turn(
        policy: &mut SketchBased,
        turn: Turn,
        flows: &mut FlowTable,
        budget: &mut RuleBudget,
    ) {
        let top = toplevel(&dev_null_tracker(), "top");
        let stats = TurnStats {
            turn,
            ..Default::default()
        };
        policy.on_turn_end(&top, &stats, flows, budget);
    }

    fn policy(replacement_turns: Turn) -> SketchBased {
        let sketch = HeavyHitterSketch::new(HashParams::from_seed(7, 4), 1024, 4, 2, 32);
        SketchBased::with_sketch(sketch, replacement_turns)
    }

    #[test]
    fn offload_set_replaced_at_boundary() {
        let mut flows = FlowTable::new();
        let heavy = flows.create(512, 0);
        let light = flows.create(512, 0);
        let mut policy = policy(2);

        policy.observe(heavy, 40);
        policy.observe(light, 4);

        let mut budget = RuleBudget::new(10);
        end_turn(&mut policy, 0, &mut flows, &mut budget);
        assert!(!flows.get(heavy).is_offloaded);

        end_turn(&mut policy, 1, &mut flows, &mut budget);
        assert!(flows.get(heavy).is_offloaded);
        assert!(!flows.get(light).is_offloaded);
        assert_eq!(budget.installed(), 1);

        // Still heavy, so remains offloaded without a new rule
        let mut budget = RuleBudget::new(10);
        end_turn(&mut policy, 3, &mut flows, &mut budget);
        assert!(flows.get(heavy).is_offloaded);
        assert_eq!(budget.installed(), 0);
    }

    #[test]
    fn cold_flows_are_cleared() {
        let mut flows = FlowTable::new();
        let heavy = flows.create(512, 0);
        let mut policy = policy(1);
        policy.observe(heavy, 64);

        let mut budget = RuleBudget::new(10);
        for turn in 0..4 {
            end_turn(&mut policy, turn, &mut flows, &mut budget);
            assert!(flows.get(heavy).is_offloaded);
        }
        end_turn(&mut policy, 4, &mut flows, &mut budget);
        assert!(!flows.get(heavy).is_offloaded);
    }

    #[test]
    fn no_threshold() {
        assert_eq!(policy(1).threshold(), None);
    }
}
