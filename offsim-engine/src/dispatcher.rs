// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Route the packets of a turn to the fast or the slow path.
//!
//! Batches of offloaded flows always go to the fast path. All other batches
//! share the slow path, which processes at most `slow_path_capacity` packets
//! per turn. Packets that do not fit are dropped and, when `drops_retry` is
//! set, handed back to their flow to be generated again later.
//!
//! After a batch has been processed on the slow path the flow may ask the
//! controller to be offloaded. The decision only affects later batches.

use std::sync::Arc;

use offsim_track::entity::Entity;
use offsim_track::trace;

use crate::config::Limits;
use crate::controller::{Offload, RuleBudget};
use crate::flow::FlowTable;
use crate::metrics::TurnStats;
use crate::types::{NO_FLOW, PacketBatch, Turn};

pub struct DualPathDispatcher {
    pub entity: Arc<Entity>,
    slow_path_capacity: u64,
    drops_retry: bool,
}

impl DualPathDispatcher {
    #[must_use]
    pub fn new(parent: &Arc<Entity>, limits: &Limits, drops_retry: bool) -> Self {
        Self {
            entity: parent.child("dispatcher"),
            slow_path_capacity: limits.slow_path_capacity,
            drops_retry,
        }
    }

    /// Process all `batches` generated in `turn`, accumulating into `stats`.
    pub fn dispatch(
        &self,
        turn: Turn,
        batches: &[PacketBatch],
        flows: &mut FlowTable,
        controller: &mut dyn Offload,
        budget: &mut RuleBudget,
        stats: &mut TurnStats,
    ) {
        for batch in batches {
            assert!(
                batch.flow != NO_FLOW,
                "Flow ID 0 reached the dispatcher in turn {turn}"
            );
            let count = u64::from(batch.count);
            let flow = flows.get_mut(batch.flow);

            if flow.is_offloaded {
                flow.fast_path_count += batch.count;
                stats.fast_path += count;
                controller.observe(batch.flow, count);
                flow.mark_finished_if_done(turn);
                continue;
            }

            let room = self.slow_path_capacity - stats.slow_path;
            let processed = count.min(room) as u32;
            let dropped = batch.count - processed;

            flow.slow_path_count += processed;
            stats.slow_path += u64::from(processed);
            stats.dropped += u64::from(dropped);

            let request = processed > 0
                && controller
                    .threshold()
                    .is_some_and(|threshold| u64::from(flow.slow_path_count) >= threshold);

            if dropped > 0 {
                trace!(self.entity ; "{} dropped {dropped}", batch.flow);
                if self.drops_retry {
                    flows.return_packets(batch.flow, dropped);
                }
            }

            if processed > 0 {
                controller.observe(batch.flow, u64::from(processed));
            }
            if request && controller.request_offload(&self.entity, batch.flow, budget) {
                flows.get_mut(batch.flow).is_offloaded = true;
            }

            flows.get_mut(batch.flow).mark_finished_if_done(turn);
        }

        assert!(stats.slow_path <= self.slow_path_capacity);
        stats.offloaded = budget.installed();
        stats.rejected = budget.rejected();
    }
}
