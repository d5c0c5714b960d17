// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Heavy hitter detection with bounded memory.
//!
//! The [HeavyHitterSketch] combines a windowed count sketch with a bounded
//! [TopK] min-heap:
//!
//! ```text
//!            hash 0      hash 1            hash H-1
//!          +--------+  +--------+        +--------+
//! update ->| slot s0|  | slot s1|  ....  | slot sH|   each slot holds W
//!          +--------+  +--------+        +--------+   windowed sub-counters
//!                 \         |                /
//!                  min over hashes of window sums  ->  estimate  ->  TopK
//! ```
//!
//! Estimates never under-count a flow inside the identification window since
//! each slot only ever adds the traffic of every flow hashed to it.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::SketchConfig;
use crate::types::FlowId;

/// The Mersenne prime `2^61 - 1` used by the universal hash family.
pub const MERSENNE_PRIME: u64 = (1 << 61) - 1;

/// Parameters `(a, b)` of one hash `h(x) = ((a*x + b) mod p) mod S`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashParams {
    pub multiplier: u64,
    pub increment: u64,
}

impl HashParams {
    /// Panics unless `1 <= multiplier < p` and `increment < p`.
    #[must_use]
    pub fn new(multiplier: u64, increment: u64) -> Self {
        assert!(
            (1..MERSENNE_PRIME).contains(&multiplier),
            "hash multiplier {multiplier} outside the prime field"
        );
        assert!(
            increment < MERSENNE_PRIME,
            "hash increment {increment} outside the prime field"
        );
        Self {
            multiplier,
            increment,
        }
    }

    /// Derive `count` independent hash parameters from a seed.
    #[must_use]
    pub fn from_seed(seed: u64, count: usize) -> Vec<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                Self::new(
                    rng.gen_range(1..MERSENNE_PRIME),
                    rng.gen_range(0..MERSENNE_PRIME),
                )
            })
            .collect()
    }

    #[must_use]
    pub fn slot(&self, key: u64, slots: usize) -> usize {
        let prime = u128::from(MERSENNE_PRIME);
        let hashed =
            (u128::from(self.multiplier) * u128::from(key) + u128::from(self.increment)) % prime;
        (hashed % slots as u128) as usize
    }
}

/// A count sketch in which every counter is split into `windows` sub-counters
/// so that old traffic can be aged out.
#[derive(Debug)]
pub struct WindowedCountSketch {
    params: Vec<HashParams>,
    slots: usize,
    windows: usize,
    current: usize,

    /// Flattened `[hash][slot][window]` counters.
    counters: Vec<u64>,
}

impl WindowedCountSketch {
    #[must_use]
    pub fn new(params: Vec<HashParams>, slots: usize, windows: usize) -> Self {
        assert!(!params.is_empty() && slots > 0 && windows > 0);
        let counters = vec![0; params.len() * slots * windows];
        Self {
            params,
            slots,
            windows,
            current: 0,
            counters,
        }
    }

    fn base(&self, hash: usize, key: u64) -> usize {
        (hash * self.slots + self.params[hash].slot(key, self.slots)) * self.windows
    }

    /// Add `value` to the current window of `flow` and return its new
    /// estimate.
    pub fn add(&mut self, flow: FlowId, value: u64) -> u64 {
        let mut estimate = u64::MAX;
        for hash in 0..self.params.len() {
            let base = self.base(hash, flow.0);
            let counter = &mut self.counters[base + self.current];
            *counter = counter.saturating_add(value);
            let sum = self.counters[base..base + self.windows]
                .iter()
                .fold(0u64, |acc, c| acc.saturating_add(*c));
            estimate = estimate.min(sum);
        }
        estimate
    }

    /// Estimated traffic of `flow` over the whole window.
    #[must_use]
    pub fn estimate(&self, flow: FlowId) -> u64 {
        (0..self.params.len())
            .map(|hash| {
                let base = self.base(hash, flow.0);
                self.counters[base..base + self.windows]
                    .iter()
                    .fold(0u64, |acc, c| acc.saturating_add(*c))
            })
            .min()
            .unwrap_or(0)
    }

    /// Advance the window pointer and clear the sub-counters it now points
    /// at.
    pub fn rotate(&mut self) {
        self.current = (self.current + 1) % self.windows;
        let current = self.current;
        for counters in self.counters.chunks_exact_mut(self.windows) {
            counters[current] = 0;
        }
    }
}

/// One tracked flow and its estimated size.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SketchEntry {
    pub flow: FlowId,
    pub estimate: u64,
}

/// A bounded min-heap of [SketchEntry] with an index from flow to heap
/// position.
#[derive(Debug)]
pub struct TopK {
    capacity: usize,
    heap: Vec<SketchEntry>,
    positions: HashMap<FlowId, usize>,
}

impl TopK {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "TopK capacity must be greater than 0");
        Self {
            capacity,
            heap: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn contains(&self, flow: FlowId) -> bool {
        self.positions.contains_key(&flow)
    }

    /// The entry with the smallest estimate.
    #[must_use]
    pub fn min(&self) -> Option<&SketchEntry> {
        self.heap.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SketchEntry> {
        self.heap.iter()
    }

    /// Offer a flow with its latest estimate.
    ///
    /// A tracked flow has its estimate updated. An untracked flow is added
    /// while there is room, otherwise it replaces the minimum if its estimate
    /// is larger. The evicted entry is returned.
    pub fn offer(&mut self, flow: FlowId, estimate: u64) -> Option<SketchEntry> {
        if let Some(&position) = self.positions.get(&flow) {
            self.heap[position].estimate = estimate;
            self.sift(position);
            return None;
        }

        let entry = SketchEntry { flow, estimate };
        if self.heap.len() < self.capacity {
            self.heap.push(entry);
            let position = self.heap.len() - 1;
            self.positions.insert(flow, position);
            self.sift_up(position);
            return None;
        }

        if estimate <= self.heap[0].estimate {
            return None;
        }
        let evicted = std::mem::replace(&mut self.heap[0], entry);
        self.positions.remove(&evicted.flow);
        self.positions.insert(flow, 0);
        self.sift_down(0);
        Some(evicted)
    }

    /// Replace all estimates, dropping entries that `estimate` maps to `None`.
    pub fn refresh(&mut self, mut estimate: impl FnMut(FlowId) -> Option<u64>) {
        let entries = std::mem::take(&mut self.heap);
        self.positions.clear();
        for entry in entries {
            if let Some(value) = estimate(entry.flow) {
                self.offer(entry.flow, value);
            }
        }
    }

    fn sift(&mut self, position: usize) {
        let position = self.sift_up(position);
        self.sift_down(position);
    }

    fn sift_up(&mut self, mut position: usize) -> usize {
        while position > 0 {
            let parent = (position - 1) / 2;
            if self.heap[parent].estimate <= self.heap[position].estimate {
                break;
            }
            self.swap(parent, position);
            position = parent;
        }
        position
    }

    fn sift_down(&mut self, mut position: usize) {
        loop {
            let left = 2 * position + 1;
            let right = left + 1;
            let mut smallest = position;
            if left < self.heap.len() && self.heap[left].estimate < self.heap[smallest].estimate {
                smallest = left;
            }
            if right < self.heap.len() && self.heap[right].estimate < self.heap[smallest].estimate
            {
                smallest = right;
            }
            if smallest == position {
                return;
            }
            self.swap(smallest, position);
            position = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.positions.insert(self.heap[a].flow, a);
        self.positions.insert(self.heap[b].flow, b);
    }
}

/// Tracks the `K` flows with the largest estimated traffic.
#[derive(Debug)]
pub struct HeavyHitterSketch {
    counts: WindowedCountSketch,
    top_k: TopK,
    min_estimate: u64,
}

impl HeavyHitterSketch {
    #[must_use]
    pub fn new(
        params: Vec<HashParams>,
        slots: usize,
        windows: usize,
        top_k: usize,
        min_estimate: u64,
    ) -> Self {
        Self {
            counts: WindowedCountSketch::new(params, slots, windows),
            top_k: TopK::new(top_k),
            min_estimate,
        }
    }

    /// Build a sketch from a validated configuration.
    #[must_use]
    pub fn from_config(config: &SketchConfig) -> Self {
        let params = match &config.hash_params {
            Some(params) => params.clone(),
            None => HashParams::from_seed(config.seed, config.hashes),
        };
        Self::new(
            params,
            config.slots,
            config.windows,
            config.top_k as usize,
            config.min_estimate,
        )
    }

    /// Account `packets` to `flow` and return its new estimate.
    pub fn update(&mut self, flow: FlowId, packets: u64) -> u64 {
        let estimate = self.counts.add(flow, packets);
        if estimate >= self.min_estimate {
            self.top_k.offer(flow, estimate);
        }
        estimate
    }

    #[must_use]
    pub fn estimate(&self, flow: FlowId) -> u64 {
        self.counts.estimate(flow)
    }

    /// Age out the oldest window and refresh the tracked flows.
    pub fn rotate(&mut self) {
        self.counts.rotate();
        let counts = &self.counts;
        let min_estimate = self.min_estimate;
        self.top_k.refresh(|flow| {
            let estimate = counts.estimate(flow);
            (estimate >= min_estimate).then_some(estimate)
        });
    }

    #[must_use]
    pub fn top_k(&self) -> &TopK {
        &self.top_k
    }

    /// The tracked heavy hitters in flow order.
    #[must_use]
    pub fn heavy_hitters(&self) -> Vec<FlowId> {
        let mut flows: Vec<FlowId> = self.top_k.iter().map(|entry| entry.flow).collect();
        flows.sort_unstable();
        flows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_heap(top_k: &TopK) {
        for (i, entry) in top_k.heap.iter().enumerate() {
            assert_eq!(top_k.positions[&entry.flow], i);
            if i > 0 {
                assert!(top_k.heap[(i - 1) / 2].estimate <= entry.estimate);
            }
        }
        assert_eq!(top_k.positions.len(), top_k.heap.len());
        assert!(top_k.len() <= top_k.capacity());
    }

    #[test]
    fn hash_is_in_range() {
        let params = HashParams::new(MERSENNE_PRIME - 1, MERSENNE_PRIME - 1);
        for key in [0, 1, 17, u64::MAX] {
            assert!(params.slot(key, 13) < 13);
        }
        assert_eq!(HashParams::new(3, 5).slot(7, 100), 26);
    }

    #[test]
    fn seeded_params_are_deterministic() {
        assert_eq!(HashParams::from_seed(9, 4), HashParams::from_seed(9, 4));
        assert_ne!(HashParams::from_seed(9, 4), HashParams::from_seed(10, 4));
    }

    #[test]
    #[should_panic(expected = "outside the prime field")]
    fn zero_multiplier_panics() {
        let _ = HashParams::new(0, 1);
    }

    #[test]
    fn estimate_never_undercounts() {
        // Only two slots so that flows collide
        let mut sketch = WindowedCountSketch::new(HashParams::from_seed(1, 3), 2, 2);
        for id in 1..=20u64 {
            sketch.add(FlowId(id), id);
        }
        for id in 1..=20u64 {
            assert!(sketch.estimate(FlowId(id)) >= id);
        }
    }

    #[test]
    fn rotation_ages_out_traffic() {
        let mut sketch = WindowedCountSketch::new(vec![HashParams::new(1, 0)], 16, 2);
        assert_eq!(sketch.add(FlowId(1), 5), 5);
        sketch.rotate();
        assert_eq!(sketch.add(FlowId(1), 3), 8);
        sketch.rotate();
        assert_eq!(sketch.estimate(FlowId(1)), 3);
        sketch.rotate();
        assert_eq!(sketch.estimate(FlowId(1)), 0);
    }

    #[test]
    fn top_k_evicts_the_minimum() {
        let mut top_k = TopK::new(2);
        assert_eq!(top_k.offer(FlowId(1), 10), None);
        assert_eq!(top_k.offer(FlowId(2), 5), None);
        assert_eq!(top_k.offer(FlowId(3), 5), None);
        assert!(!top_k.contains(FlowId(3)));

        let evicted = top_k.offer(FlowId(3), 7).unwrap();
        assert_eq!(evicted, SketchEntry { flow: FlowId(2), estimate: 5 });
        assert!(evicted.estimate <= 7);
        assert!(top_k.contains(FlowId(1)) && top_k.contains(FlowId(3)));
        assert_eq!(top_k.min().unwrap().flow, FlowId(3));
        check_heap(&top_k);
    }

    #[test]
    fn top_k_updates_in_place() {
        let mut top_k = TopK::new(3);
        top_k.offer(FlowId(1), 1);
        top_k.offer(FlowId(2), 2);
        top_k.offer(FlowId(3), 3);
        top_k.offer(FlowId(1), 9);
        assert_eq!(top_k.len(), 3);
        assert_eq!(top_k.min().unwrap().flow, FlowId(2));
        check_heap(&top_k);
    }

    #[test]
    fn top_k_never_exceeds_capacity() {
        let mut top_k = TopK::new(8);
        for i in 0..200u64 {
            let estimate = (i * 7919) % 101;
            if let Some(evicted) = top_k.offer(FlowId(i + 1), estimate) {
                assert!(evicted.estimate <= estimate);
            }
            check_heap(&top_k);
        }
        assert_eq!(top_k.len(), 8);
    }

    #[test]
    fn refresh_drops_entries() {
        let mut top_k = TopK::new(4);
        for i in 1..=4 {
            top_k.offer(FlowId(i), i);
        }
        top_k.refresh(|flow| (flow.0 % 2 == 0).then_some(100 - flow.0));
        assert_eq!(top_k.len(), 2);
        assert_eq!(top_k.min().unwrap().flow, FlowId(4));
        check_heap(&top_k);
    }

    #[test]
    fn heavy_hitters_require_min_estimate() {
        let mut sketch = HeavyHitterSketch::new(HashParams::from_seed(3, 4), 1024, 4, 2, 32);
        for _ in 0..4 {
            sketch.update(FlowId(1), 10);
            sketch.update(FlowId(2), 1);
        }
        assert_eq!(sketch.heavy_hitters(), vec![FlowId(1)]);
        assert!(sketch.estimate(FlowId(1)) >= 40);
    }

    #[test]
    fn rotation_removes_cold_flows() {
        let mut sketch = HeavyHitterSketch::new(vec![HashParams::new(1, 0)], 64, 2, 4, 4);
        sketch.update(FlowId(1), 8);
        sketch.rotate();
        assert_eq!(sketch.heavy_hitters(), vec![FlowId(1)]);
        sketch.rotate();
        assert!(sketch.heavy_hitters().is_empty());
    }
}
