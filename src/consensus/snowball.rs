//! Snowball: Snowflake with persistent per-color confidence counters

use super::{DecisionPolicy, Protocol, Tally};
use crate::node::NodeState;
use tracing::trace;

/// Confidence counters only ever grow, so one stray quorum for the other
/// color does not flip a node that has accumulated support for its own.
#[derive(Debug, Clone, Copy)]
pub struct Snowball {
    beta: u64,
}

impl Snowball {
    pub fn new(beta: u64) -> Self {
        Self { beta }
    }
}

impl DecisionPolicy for Snowball {
    fn protocol(&self) -> Protocol {
        Protocol::Snowball
    }

    fn apply(&self, state: &mut NodeState, tally: &Tally, quorum: usize) {
        if state.decided {
            return;
        }
        let Some(winner) = tally.quorum_color(quorum) else {
            return;
        };

        // Increment first, then compare against the held color.
        let confidence = state.bump_confidence(winner);
        if confidence > state.confidence(state.color) {
            trace!(from = %state.color, to = %winner, confidence, "snowball preference switch");
            state.color = winner;
        }

        if winner != state.previous_proposal {
            state.previous_proposal = winner;
            state.consecutive = 0;
        } else {
            state.consecutive += 1;
        }

        if state.consecutive > self.beta {
            state.decided = true;
        }
    }
}
