// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Offload policies.

mod proportional;
mod reactive;
mod sketch_based;
mod static_threshold;

pub use proportional::ProportionalFeedback;
pub use reactive::Reactive;
pub use sketch_based::SketchBased;
pub use static_threshold::StaticThreshold;
