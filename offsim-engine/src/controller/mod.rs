// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Offload decision controllers.
//!
//! A controller decides which flows move from the slow path to the fast path.
//! Threshold based controllers are asked by the
//! [DualPathDispatcher](crate::dispatcher::DualPathDispatcher) whenever a
//! flow's slow path count reaches their [threshold](Offload::threshold).
//! Every controller is then given the chance to update itself at the end of
//! each turn.
//!
//! The available policies live in [policy] and are selected with
//! [build_controller].

use std::sync::Arc;

use offsim_track::entity::Entity;
use offsim_track::trace;

use crate::config::{Limits, PolicyConfig};
use crate::flow::FlowTable;
use crate::metrics::TurnStats;
use crate::types::FlowId;

pub mod policy;

/// The offload rules that may still be installed in the current turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleBudget {
    capacity: u64,
    installed: u64,
    rejected: u64,
}

impl RuleBudget {
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            installed: 0,
            rejected: 0,
        }
    }

    /// Consume one rule if any are left, otherwise count a rejection.
    pub fn try_install(&mut self) -> bool {
        if self.installed < self.capacity {
            self.installed += 1;
            true
        } else {
            self.rejected += 1;
            false
        }
    }

    #[must_use]
    pub fn installed(&self) -> u64 {
        self.installed
    }

    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.capacity - self.installed
    }
}

pub trait Offload: Send {
    /// Slow path packet count at which a flow asks to be offloaded. `None`
    /// when this controller never offloads on a threshold.
    fn threshold(&self) -> Option<u64>;

    /// Ask for `flow` to be offloaded. Returns whether a rule was installed.
    fn request_offload(
        &mut self,
        entity: &Arc<Entity>,
        flow: FlowId,
        budget: &mut RuleBudget,
    ) -> bool {
        let installed = budget.try_install();
        if installed {
            trace!(entity ; "offload {flow}");
        } else {
            trace!(entity ; "reject {flow}");
        }
        installed
    }

    /// Called for every batch of processed packets, on either path.
    fn observe(&mut self, _flow: FlowId, _packets: u64) {}

    /// Called once the dispatcher has consumed all batches of the turn.
    fn on_turn_end(
        &mut self,
        entity: &Arc<Entity>,
        stats: &TurnStats,
        flows: &mut FlowTable,
        budget: &mut RuleBudget,
    );
}

/// Create the controller selected by a validated configuration.
#[must_use]
pub fn build_controller(config: &PolicyConfig, limits: &Limits) -> Box<dyn Offload> {
    match config {
        PolicyConfig::Static { threshold } => Box::new(policy::StaticThreshold::new(*threshold)),
        PolicyConfig::Reactive { initial_threshold } => {
            Box::new(policy::Reactive::new(*initial_threshold))
        }
        PolicyConfig::Proportional(config) => {
            Box::new(policy::ProportionalFeedback::new(config, limits))
        }
        PolicyConfig::Sketch(config) => Box::new(policy::SketchBased::new(config)),
    }
}
