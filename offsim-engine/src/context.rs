// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! One simulation run.
//!
//! A [SimulationContext] owns everything a run mutates: the flows, the
//! controller, the generator and the metrics. Each turn runs
//!
//! ```text
//! clock -> generator -> dispatcher (-> controller) -> controller turn end -> metrics
//! ```
//!
//! Contexts share nothing except the tracker, so any number of them can run
//! in parallel.

use std::sync::Arc;

use offsim_track::entity::Entity;
use offsim_track::{debug, info};

use crate::clock::TurnClock;
use crate::config::SimConfig;
use crate::controller::{Offload, RuleBudget, build_controller};
use crate::dispatcher::DualPathDispatcher;
use crate::flow::FlowTable;
use crate::metrics::{MetricsAggregator, RunSummary, TurnStats};
use crate::traffic::TrafficGenerator;
use crate::types::{PacketBatch, SimError, Turn};

pub struct SimulationContext {
    pub entity: Arc<Entity>,
    config: SimConfig,
    policy: String,
    clock: TurnClock,
    flows: FlowTable,
    batches: Vec<PacketBatch>,
    generator: TrafficGenerator,
    dispatcher: DualPathDispatcher,
    controller: Box<dyn Offload>,
    controller_entity: Arc<Entity>,
    metrics: MetricsAggregator,
}

impl SimulationContext {
    /// Validate `config` and build a context ready to run its first turn.
    pub fn new(parent: &Arc<Entity>, config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        let policy = config.policy.label();
        let entity = parent.child(&config.run_name());
        let controller_entity = entity.child("controller");
        info!(entity ; "{policy} for {} turns", config.turns);

        Ok(Self {
            clock: TurnClock::new(&entity, config.turns),
            flows: FlowTable::new(),
            batches: Vec::new(),
            generator: TrafficGenerator::new(&entity, &config.traffic, &config.limits),
            dispatcher: DualPathDispatcher::new(&entity, &config.limits, config.drops_retry),
            controller: build_controller(&config.policy, &config.limits),
            controller_entity,
            metrics: MetricsAggregator::new(),
            entity,
            policy,
            config,
        })
    }

    /// Simulate the current turn and advance the clock.
    ///
    /// Panics if all turns have already been run.
    pub fn run_turn(&mut self) -> &TurnStats {
        let turn = self.clock.turn();
        let mut stats = TurnStats {
            turn,
            ..Default::default()
        };

        self.batches.clear();
        let (new_flows, generated) = self.generator.generate(
            turn,
            &mut self.flows,
            self.controller.threshold(),
            &mut self.batches,
        );
        stats.new_flows = new_flows;
        stats.generated = generated;

        let mut budget = RuleBudget::new(self.config.limits.offload_rule_capacity);
        self.dispatcher.dispatch(
            turn,
            &self.batches,
            &mut self.flows,
            self.controller.as_mut(),
            &mut budget,
            &mut stats,
        );

        self.controller
            .on_turn_end(&self.controller_entity, &stats, &mut self.flows, &mut budget);
        stats.offloaded = budget.installed();
        stats.rejected = budget.rejected();
        stats.threshold = self.controller.threshold();
        assert!(stats.offloaded <= self.config.limits.offload_rule_capacity);

        debug!(self.entity ; "turn {turn}: {stats:?}");
        self.metrics.record(stats);
        self.clock.advance();

        let history = self.metrics.history();
        &history[history.len() - 1]
    }

    /// Run all remaining turns and summarise the run.
    pub fn run(mut self) -> RunSummary {
        while !self.clock.is_finished() {
            self.run_turn();
        }
        let summary = self.summary();
        info!(self.entity ; "completed: drop rate {:.3}%, mean latency {:.2}us, mean completion {:.3}s",
            summary.drop_rate_pct, summary.mean_latency_us, summary.mean_fct_secs);
        summary
    }

    /// Summarise the turns run so far.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        self.metrics.summarise(
            &self.entity.name,
            &self.policy,
            &self.flows,
            &self.config.latency,
        )
    }

    #[must_use]
    pub fn turn(&self) -> Turn {
        self.clock.turn()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.clock.is_finished()
    }

    #[must_use]
    pub fn flows(&self) -> &FlowTable {
        &self.flows
    }

    #[must_use]
    pub fn controller(&self) -> &dyn Offload {
        self.controller.as_ref()
    }

    #[must_use]
    pub fn history(&self) -> &[TurnStats] {
        self.metrics.history()
    }

    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }
}
