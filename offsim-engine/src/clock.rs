// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The simulation clock.
//!
//! Time advances in whole turns of one second each.

use std::sync::Arc;

use offsim_track::entity::Entity;
use offsim_track::set_turn;

use crate::types::Turn;

pub struct TurnClock {
    entity: Arc<Entity>,
    turn: Turn,
    num_turns: Turn,
}

impl TurnClock {
    #[must_use]
    pub fn new(entity: &Arc<Entity>, num_turns: Turn) -> Self {
        Self {
            entity: entity.clone(),
            turn: 0,
            num_turns,
        }
    }

    /// The turn being simulated.
    #[must_use]
    pub fn turn(&self) -> Turn {
        self.turn
    }

    #[must_use]
    pub fn num_turns(&self) -> Turn {
        self.num_turns
    }

    /// Simulated time at the start of the current turn.
    #[must_use]
    pub fn time_now_secs(&self) -> f64 {
        f64::from(self.turn)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.turn >= self.num_turns
    }

    /// Move on to the next turn.
    pub fn advance(&mut self) {
        assert!(!self.is_finished(), "clock advanced past turn {}", self.num_turns);
        self.turn += 1;
        set_turn!(self.entity ; u64::from(self.turn));
    }
}

#[cfg(test)]
mod tests {
    use offsim_track::entity::toplevel;
    use offsim_track::{test_helpers, test_init};

    use super::*;

    #[test]
    fn counts_turns() {
        let (test_tracker, tracker) = test_init!(1);
        let top = toplevel(&tracker, "top");
        let mut clock = TurnClock::new(&top, 2);
        test_helpers::check_and_clear(&test_tracker, &["0: created 1, top"]);

        assert_eq!(clock.turn(), 0);
        clock.advance();
        assert_eq!(clock.time_now_secs(), 1.0);
        assert!(!clock.is_finished());
        clock.advance();
        assert!(clock.is_finished());
        test_helpers::check_and_clear(&test_tracker, &["1: set turn 1", "1: set turn 2"]);
    }

    #[test]
    #[should_panic(expected = "clock advanced past turn 1")]
    fn cannot_pass_end() {
        let top = toplevel(&offsim_track::tracker::dev_null_tracker(), "top");
        let mut clock = TurnClock::new(&top, 1);
        clock.advance();
        clock.advance();
    }
}
