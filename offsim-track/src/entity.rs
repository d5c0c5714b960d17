// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Named simulation entities.
//!
//! Every part of a run that logs (the run itself, its dispatcher, generator
//! and controller) owns an [`Entity`]. Entities form a tree rooted at the
//! [`toplevel`] entity of the engine, for example
//!
//! ```text
//! top
//! ├── static-16
//! │   ├── controller
//! │   ├── dispatcher
//! │   └── generator
//! └── sketch-k20000
//!     └── ...
//! ```
//!
//! The `::` separated path of an entity is what the log level filters of the
//! [`EntityManager`](crate::tracker::EntityManager) are matched against.

use std::fmt;
use std::sync::Arc;

use crate::{Id, NO_ID, Tracker, create, destroy};

/// Separator between the names of an entity path.
pub const PATH_SEPARATOR: &str = "::";

/// A node of the entity tree.
pub struct Entity {
    /// Name of this entity within its parent.
    pub name: String,

    /// The entity this one was created under. Only the top-level has none.
    pub parent: Option<Arc<Entity>>,

    /// Identifier emitted with every log message of this entity.
    pub id: Id,

    /// Where the log events of this entity go.
    pub tracker: Tracker,

    path: String,
}

impl Entity {
    fn register(tracker: &Tracker, parent: Option<Arc<Entity>>, name: &str) -> Self {
        let path = match &parent {
            Some(parent) => format!("{}{PATH_SEPARATOR}{name}", parent.path),
            None => name.to_string(),
        };
        let id = tracker.unique_id();
        tracker.add_entity(id, &path);

        let entity = Self {
            name: name.to_string(),
            parent,
            id,
            tracker: tracker.clone(),
            path,
        };
        create!(entity);
        entity
    }

    /// Create an entity named `name` under `parent`, sharing its tracker.
    #[must_use]
    pub fn new(parent: &Arc<Entity>, name: &str) -> Self {
        Self::register(&parent.tracker, Some(parent.clone()), name)
    }

    /// As [new](Self::new), returning the shared handle that components keep.
    #[must_use]
    pub fn child(self: &Arc<Self>, name: &str) -> Arc<Entity> {
        Arc::new(Self::new(self, name))
    }

    /// ID of the parent, or [`NO_ID`] for the top-level entity.
    #[must_use]
    pub fn parent_id(&self) -> Id {
        self.parent.as_ref().map_or(NO_ID, |parent| parent.id)
    }

    /// The `::` separated path from the top-level entity.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.path.clone()
    }
}

impl Drop for Entity {
    fn drop(&mut self) {
        destroy!(self);
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({} {})", self.id, self.path)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Create the root of an entity tree.
pub fn toplevel(tracker: &Tracker, name: &str) -> Arc<Entity> {
    Arc::new(Entity::register(tracker, None, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_init;

    #[test]
    fn paths_follow_the_tree() {
        let (_test_tracker, tracker) = test_init!(1);
        let top = toplevel(&tracker, "top");
        let run = top.child("static-16");
        let dispatcher = run.child("dispatcher");

        assert_eq!(dispatcher.full_name(), "top::static-16::dispatcher");
        assert_eq!(format!("{dispatcher}"), "top::static-16::dispatcher");
        assert_eq!(format!("{dispatcher:?}"), "Entity(3 top::static-16::dispatcher)");
        assert_eq!(run.name, "static-16");
        assert!(top.parent.is_none());
    }

    #[test]
    fn creation_and_destruction_are_tracked() {
        let (test_tracker, tracker) = test_init!(1);
        let top = toplevel(&tracker, "top");
        {
            let _run = top.child("reactive");
        }
        crate::test_helpers::check_and_clear(
            &test_tracker,
            &["0: created 1, top", "1: created 2, top::reactive", "1: destroyed 2"],
        );
    }
}
