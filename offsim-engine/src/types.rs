// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Shared types.

use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A simulation turn. Each turn represents one second of simulated time.
pub type Turn = u32;

/// `Err` of a [SimError] holding `$msg`.
#[macro_export]
macro_rules! sim_error {
    ($msg:expr) => {
        Err($crate::types::SimError($msg.to_string()))
    };
}

/// A configuration or run that cannot be simulated.
#[derive(Clone, Debug, PartialEq)]
pub struct SimError(pub String);

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error: {}", self.0)
    }
}

impl Error for SimError {}

/// Result of operations that only report failure.
pub type SimResult = Result<(), SimError>;

/// Identifier of a simulated flow.
///
/// IDs are allocated monotonically from `1`. The value `0` is reserved as
/// [NO_FLOW] and never identifies a valid flow.
#[derive(Copy, Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct FlowId(pub u64);

/// Sentinel flow ID
pub const NO_FLOW: FlowId = FlowId(0);

impl FlowId {
    /// Position of this flow in a zero-based table.
    ///
    /// Panics for [NO_FLOW].
    #[must_use]
    pub fn index(self) -> usize {
        assert!(self != NO_FLOW, "Flow ID 0 is not a valid flow");
        (self.0 - 1) as usize
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "flow{}", self.0)
    }
}

impl fmt::Debug for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A group of packets belonging to one flow that were generated together in
/// one turn.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PacketBatch {
    /// The flow all packets of this batch belong to.
    pub flow: FlowId,

    /// Number of packets in the batch.
    pub count: u32,
}

impl PacketBatch {
    /// `count` packets of `flow`.
    #[must_use]
    pub fn new(flow: FlowId, count: u32) -> Self {
        Self { flow, count }
    }
}
