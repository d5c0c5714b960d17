// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Synthetic traffic.
//!
//! Each turn the [TrafficGenerator] admits new flows and emits one batch for
//! each of them. It then tops up the turn with one batch for each older flow
//! that still has packets, oldest first, until the turn's packet budget is
//! used.

use std::sync::Arc;

use offsim_track::entity::Entity;
use offsim_track::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{Limits, SizeClass, SizeSampling, TrafficConfig};
use crate::flow::FlowTable;
use crate::types::{FlowId, PacketBatch, Turn};

/// Cumulative percentile bands mapping to flow sizes.
#[derive(Clone, Debug, PartialEq)]
pub struct SizeDistribution {
    bands: Vec<(f64, u32)>,
}

/// Band edges are rounded to avoid accumulated error at integer percentiles.
fn round_edge(edge: f64) -> f64 {
    (edge * 1e9).round() / 1e9
}

impl SizeDistribution {
    /// Build the distribution from the rat and elephant tables of a validated
    /// configuration.
    #[must_use]
    pub fn new(config: &TrafficConfig) -> Self {
        let mut bands = Vec::new();
        let mut edge = 0.0;
        let mut add_group = |sizes: &[SizeClass], share: f64| {
            let total: f64 = sizes.iter().map(|class| class.weight).sum();
            for class in sizes {
                edge += share * class.weight / total;
                bands.push((round_edge(edge), class.packets));
            }
        };
        add_group(&config.rat_sizes, 100.0 - config.elephant_percent);
        add_group(&config.elephant_sizes, config.elephant_percent);
        Self { bands }
    }

    /// Map a percentile in `[0, 100)` to a flow size.
    #[must_use]
    pub fn sample(&self, percentile: f64) -> u32 {
        self.bands
            .iter()
            .find(|(edge, _)| percentile < *edge)
            .or(self.bands.last())
            .map_or(0, |(_, packets)| *packets)
    }
}

enum Sampler {
    Cyclic,
    Seeded(StdRng),
}

impl Sampler {
    fn percentile(&mut self, id: FlowId) -> f64 {
        match self {
            Self::Cyclic => ((id.0 - 1) % 100) as f64,
            Self::Seeded(rng) => rng.gen_range(0.0..100.0),
        }
    }
}

pub struct TrafficGenerator {
    pub entity: Arc<Entity>,
    config: TrafficConfig,
    new_flows_per_turn: u64,
    packets_per_turn: u64,
    distribution: SizeDistribution,
    sampler: Sampler,
}

impl TrafficGenerator {
    #[must_use]
    pub fn new(parent: &Arc<Entity>, config: &TrafficConfig, limits: &Limits) -> Self {
        let sampler = match config.sampling {
            SizeSampling::Cyclic => Sampler::Cyclic,
            SizeSampling::Seeded { seed } => Sampler::Seeded(StdRng::seed_from_u64(seed)),
        };
        Self {
            entity: parent.child("generator"),
            config: config.clone(),
            new_flows_per_turn: limits.new_flows_per_turn,
            packets_per_turn: limits.packets_per_turn,
            distribution: SizeDistribution::new(config),
            sampler,
        }
    }

    /// Number of new flows admitted in `turn`.
    #[must_use]
    pub fn admission_target(&self, turn: Turn) -> u64 {
        (self.new_flows_per_turn as f64 * self.config.ramp.multiplier_at(turn)).round() as u64
    }

    fn is_elephant(&self, remaining: u32) -> bool {
        remaining >= self.config.elephant_cutoff
    }

    /// Take up to `size` packets from `id` and queue them as one batch.
    fn emit(flows: &mut FlowTable, id: FlowId, size: u32, batches: &mut Vec<PacketBatch>) -> u64 {
        let count = flows.get_mut(id).take_packets(size);
        if count == 0 {
            return 0;
        }
        batches.push(PacketBatch::new(id, count));
        u64::from(count)
    }

    /// Generate the batches of `turn`.
    ///
    /// `threshold` is the controller's current threshold which is used as the
    /// first batch size of new elephants. Returns the number of new flows and
    /// the number of packets generated.
    pub fn generate(
        &mut self,
        turn: Turn,
        flows: &mut FlowTable,
        threshold: Option<u64>,
        batches: &mut Vec<PacketBatch>,
    ) -> (u64, u64) {
        let first_new = flows.next_id();
        let new_flows = self.admission_target(turn);
        let start_batch = threshold.map_or(self.config.elephant_start_batch_size, |t| {
            u32::try_from(t).unwrap_or(u32::MAX)
        });

        let mut generated = 0;
        for _ in 0..new_flows {
            let size = self.distribution.sample(self.sampler.percentile(flows.next_id()));
            let id = flows.create(size, turn);
            let batch_size = if self.is_elephant(size) {
                start_batch
            } else {
                self.config.rat_batch_size
            };
            generated += Self::emit(flows, id, batch_size, batches);
        }

        let mut id = flows.oldest_active();
        while generated < self.packets_per_turn && id < first_new {
            let remaining = flows.get(id).remaining_packets();
            if remaining > 0 {
                let batch_size = if self.is_elephant(remaining) {
                    self.config.elephant_batch_size
                } else {
                    self.config.rat_batch_size
                };
                generated += Self::emit(flows, id, batch_size, batches);
            }
            id = FlowId(id.0 + 1);
        }

        trace!(self.entity ; "turn {turn}: {new_flows} new flows, {generated} packets in {} batches", batches.len());
        (new_flows, generated)
    }
}
