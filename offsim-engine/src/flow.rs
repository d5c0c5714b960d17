// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Flows and the table that owns them.
//!
//! The [FlowTable] is append-only: flows are created with monotonically
//! increasing [FlowId]s starting at `1` and are never removed during a run.
//! Per-flow counters use `u32` to keep the table compact since a full-rate run
//! holds tens of millions of flows.

use crate::types::{FlowId, Turn};

/// One simulated connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Flow {
    /// All further packets bypass the slow path while set.
    pub is_offloaded: bool,

    /// Packets processed on the fast path.
    pub fast_path_count: u32,

    /// Packets processed on the slow path.
    pub slow_path_count: u32,

    remaining_packets: u32,
    initial_packets: u32,
    start_turn: Turn,
    finish_turn: Option<Turn>,
}

impl Flow {
    fn new(initial_packets: u32, start_turn: Turn) -> Self {
        Self {
            is_offloaded: false,
            fast_path_count: 0,
            slow_path_count: 0,
            remaining_packets: initial_packets,
            initial_packets,
            start_turn,
            finish_turn: None,
        }
    }

    /// Packets that have not been placed in a batch yet.
    #[must_use]
    pub fn remaining_packets(&self) -> u32 {
        self.remaining_packets
    }

    #[must_use]
    pub fn initial_packets(&self) -> u32 {
        self.initial_packets
    }

    #[must_use]
    pub fn start_turn(&self) -> Turn {
        self.start_turn
    }

    /// The turn in which the last packet was processed.
    #[must_use]
    pub fn finish_turn(&self) -> Option<Turn> {
        self.finish_turn
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finish_turn.is_some()
    }

    /// Remove up to `max` packets from the flow, returning how many were
    /// taken.
    pub fn take_packets(&mut self, max: u32) -> u32 {
        let taken = max.min(self.remaining_packets);
        self.remaining_packets -= taken;
        taken
    }

    /// Record the finish turn the first time the flow runs out of packets.
    pub fn mark_finished_if_done(&mut self, turn: Turn) {
        if self.remaining_packets == 0 && self.finish_turn.is_none() {
            assert!(
                turn >= self.start_turn,
                "flow finished in turn {turn} before it started in turn {}",
                self.start_turn
            );
            self.finish_turn = Some(turn);
        }
    }
}

/// Storage for all flows of one simulation run.
#[derive(Debug, Default)]
pub struct FlowTable {
    flows: Vec<Flow>,

    /// Index below which every flow is known to have no remaining packets.
    oldest_active: usize,
}

impl FlowTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The ID the next created flow will receive.
    #[must_use]
    pub fn next_id(&self) -> FlowId {
        FlowId(self.flows.len() as u64 + 1)
    }

    /// Create a flow and return its ID.
    pub fn create(&mut self, initial_packets: u32, turn: Turn) -> FlowId {
        self.flows.push(Flow::new(initial_packets, turn));
        FlowId(self.flows.len() as u64)
    }

    /// Panics if `id` is the sentinel or does not exist.
    #[must_use]
    pub fn get(&self, id: FlowId) -> &Flow {
        match self.flows.get(id.index()) {
            Some(flow) => flow,
            None => panic!("Unknown flow {id}"),
        }
    }

    /// Panics if `id` is the sentinel or does not exist.
    pub fn get_mut(&mut self, id: FlowId) -> &mut Flow {
        match self.flows.get_mut(id.index()) {
            Some(flow) => flow,
            None => panic!("Unknown flow {id}"),
        }
    }

    /// Give `count` dropped packets back to a flow so they are generated
    /// again.
    pub fn return_packets(&mut self, id: FlowId, count: u32) {
        if count == 0 {
            return;
        }
        let index = id.index();
        let flow = self.get_mut(id);
        flow.remaining_packets = match flow.remaining_packets.checked_add(count) {
            Some(remaining) => remaining,
            None => panic!("{id} remaining packets overflowed"),
        };
        assert!(
            flow.remaining_packets <= flow.initial_packets,
            "{id} has more remaining packets than it was created with"
        );
        self.oldest_active = self.oldest_active.min(index);
    }

    /// The oldest flow that may still have packets to send.
    ///
    /// Returns [next_id](Self::next_id) when no flow is active.
    pub fn oldest_active(&mut self) -> FlowId {
        while self.oldest_active < self.flows.len()
            && self.flows[self.oldest_active].remaining_packets == 0
        {
            self.oldest_active += 1;
        }
        FlowId(self.oldest_active as u64 + 1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Iterate over all flows in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (FlowId, &Flow)> {
        self.flows
            .iter()
            .enumerate()
            .map(|(i, flow)| (FlowId(i as u64 + 1), flow))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NO_FLOW;

    #[test]
    fn ids_start_at_one() {
        let mut flows = FlowTable::new();
        assert_eq!(flows.next_id(), FlowId(1));
        assert_eq!(flows.create(4, 0), FlowId(1));
        assert_eq!(flows.create(8, 0), FlowId(2));
        assert_eq!(flows.len(), 2);
        assert_eq!(flows.get(FlowId(2)).remaining_packets(), 8);
    }

    #[test]
    #[should_panic(expected = "Flow ID 0 is not a valid flow")]
    fn sentinel_panics() {
        let mut flows = FlowTable::new();
        flows.create(4, 0);
        let _ = flows.get(NO_FLOW);
    }

    #[test]
    #[should_panic(expected = "Unknown flow flow3")]
    fn unknown_flow_panics() {
        let mut flows = FlowTable::new();
        flows.create(4, 0);
        let _ = flows.get_mut(FlowId(3));
    }

    #[test]
    fn take_never_underflows() {
        let mut flows = FlowTable::new();
        let id = flows.create(6, 0);
        let flow = flows.get_mut(id);
        assert_eq!(flow.take_packets(4), 4);
        assert_eq!(flow.take_packets(4), 2);
        assert_eq!(flow.take_packets(4), 0);
        assert_eq!(flow.remaining_packets(), 0);
    }

    #[test]
    fn finish_turn_is_set_once() {
        let mut flows = FlowTable::new();
        let id = flows.create(4, 2);
        let flow = flows.get_mut(id);
        flow.mark_finished_if_done(2);
        assert_eq!(flow.finish_turn(), None);

        flow.take_packets(4);
        flow.mark_finished_if_done(3);
        flow.mark_finished_if_done(7);
        assert_eq!(flow.finish_turn(), Some(3));
    }

    #[test]
    fn oldest_active_skips_drained_flows() {
        let mut flows = FlowTable::new();
        let first = flows.create(4, 0);
        let second = flows.create(4, 0);
        flows.create(4, 0);

        flows.get_mut(first).take_packets(4);
        flows.get_mut(second).take_packets(4);
        assert_eq!(flows.oldest_active(), FlowId(3));

        flows.return_packets(first, 2);
        assert_eq!(flows.oldest_active(), first);
        assert_eq!(flows.get(first).remaining_packets(), 2);
    }

    #[test]
    fn oldest_active_when_all_drained() {
        let mut flows = FlowTable::new();
        let id = flows.create(2, 0);
        flows.get_mut(id).take_packets(2);
        assert_eq!(flows.oldest_active(), flows.next_id());
    }
}
