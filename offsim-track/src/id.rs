// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Entity identifiers.

use std::fmt;

/// Number printed at the start of every line an entity logs.
///
/// [NO_ID](crate::NO_ID) and [ROOT](crate::ROOT) are never handed out by a
/// tracker.
#[derive(Copy, Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Id(pub u64);

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
