// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Run simulations, individually or as a parallel sweep.

use std::sync::Arc;

use offsim_track::entity::{Entity, toplevel};
use offsim_track::{Tracker, error};
use rayon::prelude::*;

use crate::config::SimConfig;
use crate::context::SimulationContext;
use crate::metrics::RunSummary;
use crate::types::SimError;

pub struct Engine {
    top: Arc<Entity>,
    tracker: Tracker,
}

impl Engine {
    #[must_use]
    pub fn new(tracker: &Tracker) -> Self {
        Self {
            top: toplevel(tracker, "top"),
            tracker: tracker.clone(),
        }
    }

    /// The top-level entity that all runs are created under.
    #[must_use]
    pub fn top(&self) -> &Arc<Entity> {
        &self.top
    }

    #[must_use]
    pub fn tracker(&self) -> Tracker {
        self.tracker.clone()
    }

    /// Build a context for a configuration without running it.
    pub fn build(&self, config: SimConfig) -> Result<SimulationContext, SimError> {
        SimulationContext::new(&self.top, config)
    }

    /// Run one configuration to completion.
    pub fn run(&self, config: SimConfig) -> Result<RunSummary, SimError> {
        let name = config.run_name();
        let result = self.build(config).map(SimulationContext::run);
        if let Err(e) = &result {
            error!(self.top ; "{name}: {e}");
        }
        result
    }

    /// Run all configurations in parallel.
    ///
    /// The results are returned in the order of `configs`. A configuration
    /// that fails validation does not affect the others.
    pub fn run_sweep(&self, configs: Vec<SimConfig>) -> Vec<Result<RunSummary, SimError>> {
        self.run_sweep_with(configs, |_| {})
    }

    /// As [run_sweep](Self::run_sweep) but calls `on_done` as each run
    /// finishes.
    pub fn run_sweep_with<F>(
        &self,
        configs: Vec<SimConfig>,
        on_done: F,
    ) -> Vec<Result<RunSummary, SimError>>
    where
        F: Fn(&Result<RunSummary, SimError>) + Sync,
    {
        configs
            .into_par_iter()
            .map(|config| {
                let result = self.run(config);
                on_done(&result);
                result
            })
            .collect()
    }

    /// Flush all trackers.
    pub fn shutdown(&self) {
        self.tracker.shutdown();
    }
}
