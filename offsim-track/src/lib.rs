// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Text logging for offload simulations.
//!
//! Each message is emitted on behalf of an [`Entity`](crate::entity::Entity)
//! and carries its numeric [`Id`]. Entities are named by their position in
//! the simulation, such as `top::static-16::dispatcher`, and the level of
//! each one can be raised or lowered by matching a regular expression against
//! that name.
//!
//! Events go to a [`Tracker`]. All runs of a sweep share one tracker from
//! several threads.
//!
//! ```rust
//! use offsim_track::entity::toplevel;
//! use offsim_track::info;
//! use offsim_track::tracker::dev_null_tracker;
//!
//! let tracker = dev_null_tracker();
//! let top = toplevel(&tracker, "top");
//! info!(top ; "{} turns", 50);
//! ```

#![warn(missing_docs)]

use std::sync::{Arc, Mutex};

pub use log;

pub mod builder;
pub mod entity;
pub mod id;
pub mod test_helpers;
pub mod tracker;

pub use id::Id;
pub use tracker::{Track, Tracker};

/// Destination of a text tracker.
pub type Writer = Box<dyn std::io::Write + Send>;
type SharedWriter = Arc<Mutex<Writer>>;

/// Stands in for the parent of a top-level entity.
pub const NO_ID: Id = Id(0);

/// Reserved for the engine; tracker IDs are handed out after it.
pub const ROOT: Id = Id(1);

/// Run `$body` only when `$entity` is enabled at `$level`.
#[doc(hidden)]
#[macro_export]
macro_rules! if_enabled {
    ($entity:expr, $level:expr, $body:block) => {
        if $entity.tracker.is_entity_enabled($entity.id, $level) $body
    };
}

/// Report that an entity was created.
#[macro_export]
macro_rules! create {
    ($entity:expr) => {
        $crate::if_enabled!($entity, $crate::log::Level::Trace, {
            $entity
                .tracker
                .create($entity.parent_id(), $entity.id, &$entity.full_name());
        })
    };
}

/// Report that an entity was dropped.
#[macro_export]
macro_rules! destroy {
    ($entity:expr) => {
        $crate::if_enabled!($entity, $crate::log::Level::Trace, {
            $entity.tracker.destroy($entity.parent_id(), $entity.id);
        })
    };
}

/// Report that the clock of an entity reached a new turn.
#[macro_export]
macro_rules! set_turn {
    ($entity:expr ; $turn:expr) => {
        $crate::if_enabled!($entity, $crate::log::Level::Trace, {
            $entity.tracker.turn($entity.id, $turn);
        })
    };
}

/// Log a message at an explicit level.
///
/// The arguments are not formatted unless the entity is enabled.
#[macro_export]
macro_rules! log_base {
    ($entity:expr ; $lvl:expr, $($arg:tt)+) => {
        $crate::if_enabled!($entity, $lvl, {
            $entity.tracker.log($entity.id, $lvl, format_args!($($arg)+));
        })
    };
}

/// [`log_base`] at `Trace`.
#[macro_export]
macro_rules! trace {
    ($entity:expr ; $($arg:tt)+) => {
        $crate::log_base!($entity ; $crate::log::Level::Trace, $($arg)+)
    };
}

/// [`log_base`] at `Debug`.
#[macro_export]
macro_rules! debug {
    ($entity:expr ; $($arg:tt)+) => {
        $crate::log_base!($entity ; $crate::log::Level::Debug, $($arg)+)
    };
}

/// [`log_base`] at `Info`.
#[macro_export]
macro_rules! info {
    ($entity:expr ; $($arg:tt)+) => {
        $crate::log_base!($entity ; $crate::log::Level::Info, $($arg)+)
    };
}

/// [`log_base`] at `Warn`.
#[macro_export]
macro_rules! warn {
    ($entity:expr ; $($arg:tt)+) => {
        $crate::log_base!($entity ; $crate::log::Level::Warn, $($arg)+)
    };
}

/// [`log_base`] at `Error`.
#[macro_export]
macro_rules! error {
    ($entity:expr ; $($arg:tt)+) => {
        $crate::log_base!($entity ; $crate::log::Level::Error, $($arg)+)
    };
}
