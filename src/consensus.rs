//! Decision policies for the Snow family of metastable consensus protocols

pub mod slush;
pub mod snowball;
pub mod snowflake;

use crate::error::{Result, SnowsimError};
use crate::node::NodeState;
use crate::types::Color;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use slush::Slush;
pub use snowball::Snowball;
pub use snowflake::Snowflake;

/// Rule that turns one round's poll into a node state transition.
///
/// Every implementation must leave the state untouched when no color reaches
/// the quorum.
pub trait DecisionPolicy: Send + Sync + fmt::Debug {
    /// Which protocol this policy implements
    fn protocol(&self) -> Protocol;

    /// Apply a round's tally to the node state
    fn apply(&self, state: &mut NodeState, tally: &Tally, quorum: usize);

    /// Whether the node has crossed its confidence threshold
    fn is_decided(&self, state: &NodeState) -> bool {
        state.decided
    }

    /// Whether the scheduler should run until every node decides, rather than
    /// a fixed number of rounds
    fn runs_until_decided(&self) -> bool {
        true
    }
}

/// Smallest response count for one color that forms a quorum: `ceil(alpha * k)`.
///
/// For integer counts `count >= ceil(alpha * k)` is the same test as
/// `count >= alpha * k`.
pub fn quorum_size(k: usize, alpha: f64) -> usize {
    (alpha * k as f64).ceil() as usize
}

/// Supported protocol variants
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Slush,
    Snowflake,
    #[default]
    Snowball,
}

impl Protocol {
    /// Build the decision policy for this protocol
    pub fn policy(self, beta: u64) -> Arc<dyn DecisionPolicy> {
        match self {
            Protocol::Slush => Arc::new(Slush),
            Protocol::Snowflake => Arc::new(Snowflake::new(beta)),
            Protocol::Snowball => Arc::new(Snowball::new(beta)),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Slush => write!(f, "slush"),
            Protocol::Snowflake => write!(f, "snowflake"),
            Protocol::Snowball => write!(f, "snowball"),
        }
    }
}

impl FromStr for Protocol {
    type Err = SnowsimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "slush" => Ok(Protocol::Slush),
            "snowflake" => Ok(Protocol::Snowflake),
            "snowball" => Ok(Protocol::Snowball),
            other => Err(SnowsimError::validation(format!("unknown protocol '{}'", other))),
        }
    }
}

/// Per-color response counts for one round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    counts: HashMap<Color, usize>,
    size: usize,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one response. Uncolored responses are ignored.
    pub fn add(&mut self, color: Color) {
        if color.is_colored() {
            *self.counts.entry(color).or_insert(0) += 1;
            self.size += 1;
        }
    }

    pub fn count(&self, color: Color) -> usize {
        self.counts.get(&color).copied().unwrap_or(0)
    }

    /// Number of counted responses
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// First color, scanning A before B, whose count meets the quorum.
    pub fn quorum_color(&self, quorum: usize) -> Option<Color> {
        Color::CHOICES
            .into_iter()
            .find(|color| self.meets_quorum(*color, quorum))
    }

    pub fn meets_quorum(&self, color: Color, quorum: usize) -> bool {
        color.is_colored() && self.count(color) >= quorum
    }
}

impl FromIterator<Color> for Tally {
    fn from_iter<I: IntoIterator<Item = Color>>(iter: I) -> Self {
        let mut tally = Tally::new();
        for color in iter {
            tally.add(color);
        }
        tally
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A:{} B:{}", self.count(Color::A), self.count(Color::B))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_ignores_uncolored() {
        let tally: Tally = [Color::A, Color::Uncolored, Color::B, Color::A]
            .into_iter()
            .collect();
        assert_eq!(tally.len(), 3);
        assert_eq!(tally.count(Color::A), 2);
        assert_eq!(tally.count(Color::B), 1);
        assert_eq!(tally.count(Color::Uncolored), 0);
    }

    #[test]
    fn quorum_size_rounds_up() {
        assert_eq!(quorum_size(5, 0.7), 4);
        assert_eq!(quorum_size(1, 0.5), 1);
        assert_eq!(quorum_size(4, 0.5), 2);
    }

    #[test]
    fn quorum_scan_prefers_a() {
        let tally: Tally = [Color::A, Color::B].into_iter().collect();
        assert_eq!(tally.quorum_color(1), Some(Color::A));
        assert_eq!(tally.quorum_color(2), None);
    }

    #[test]
    fn protocol_round_trips_through_strings() {
        for protocol in [Protocol::Slush, Protocol::Snowflake, Protocol::Snowball] {
            assert_eq!(protocol.to_string().parse::<Protocol>().unwrap(), protocol);
        }
        assert!("avalanche".parse::<Protocol>().is_err());
    }

    #[test]
    fn only_slush_runs_fixed_rounds() {
        assert!(!Protocol::Slush.policy(4).runs_until_decided());
        assert!(Protocol::Snowflake.policy(4).runs_until_decided());
        assert!(Protocol::Snowball.policy(4).runs_until_decided());
    }
}
