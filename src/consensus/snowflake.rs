//! Snowflake: Slush plus a streak counter of consecutive quorum rounds

use super::{DecisionPolicy, Protocol, Tally};
use crate::node::NodeState;

#[derive(Debug, Clone, Copy)]
pub struct Snowflake {
    beta: u64,
}

impl Snowflake {
    /// A node decides once its streak exceeds `beta`.
    pub fn new(beta: u64) -> Self {
        Self { beta }
    }
}

impl DecisionPolicy for Snowflake {
    fn protocol(&self) -> Protocol {
        Protocol::Snowflake
    }

    fn apply(&self, state: &mut NodeState, tally: &Tally, quorum: usize) {
        if state.decided {
            return;
        }
        let Some(winner) = tally.quorum_color(quorum) else {
            return;
        };

        if winner == state.color {
            state.consecutive += 1;
        } else {
            // The switching round opens the new agreement run.
            state.color = winner;
            state.consecutive = 1;
        }

        if state.consecutive > self.beta {
            state.decided = true;
        }
    }
}
