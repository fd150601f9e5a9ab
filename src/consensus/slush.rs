//! Slush: flip to the opposing color whenever it reaches quorum

use super::{DecisionPolicy, Protocol, Tally};
use crate::node::NodeState;

/// Memoryless policy. A Slush node never decides, so runs are bounded by a
/// fixed round count instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct Slush;

impl DecisionPolicy for Slush {
    fn protocol(&self) -> Protocol {
        Protocol::Slush
    }

    fn apply(&self, state: &mut NodeState, tally: &Tally, quorum: usize) {
        if let Some(opposing) = state.color.opposite() {
            if tally.meets_quorum(opposing, quorum) {
                state.color = opposing;
            }
        }
    }

    fn is_decided(&self, _state: &NodeState) -> bool {
        false
    }

    fn runs_until_decided(&self) -> bool {
        false
    }
}
