//! Common type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::SnowsimError;

/// A node's current opinion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    #[default]
    Uncolored,
    A,
    B,
}

impl Color {
    /// The competing colors, in the order decision policies scan them.
    pub const CHOICES: [Color; 2] = [Color::A, Color::B];

    /// The competing color, or `None` for `Uncolored`.
    pub fn opposite(self) -> Option<Color> {
        match self {
            Color::A => Some(Color::B),
            Color::B => Some(Color::A),
            Color::Uncolored => None,
        }
    }

    pub fn is_colored(self) -> bool {
        self != Color::Uncolored
    }

    /// Seed color by index parity: even indices get `A`, odd get `B`.
    pub fn seed_for(index: usize) -> Color {
        if index % 2 == 0 {
            Color::A
        } else {
            Color::B
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Uncolored => write!(f, "uncolored"),
            Color::A => write!(f, "A"),
            Color::B => write!(f, "B"),
        }
    }
}

impl FromStr for Color {
    type Err = SnowsimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uncolored" | "none" | "0" => Ok(Color::Uncolored),
            "a" | "red" | "1" => Ok(Color::A),
            "b" | "blue" | "2" => Ok(Color::B),
            other => Err(SnowsimError::validation(format!("unknown color '{}'", other))),
        }
    }
}

/// Stable index of a node in the network arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reported one-based, like the driver output.
        write!(f, "node {}", self.0 + 1)
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// Unique identifier for a simulation run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_colors() {
        assert_eq!(Color::A.opposite(), Some(Color::B));
        assert_eq!(Color::B.opposite(), Some(Color::A));
        assert_eq!(Color::Uncolored.opposite(), None);
    }

    #[test]
    fn seeds_alternate_by_parity() {
        let seeds: Vec<Color> = (0..4).map(Color::seed_for).collect();
        assert_eq!(seeds, vec![Color::A, Color::B, Color::A, Color::B]);
    }

    #[test]
    fn parse_color_names() {
        assert_eq!("a".parse::<Color>().unwrap(), Color::A);
        assert_eq!("Blue".parse::<Color>().unwrap(), Color::B);
        assert_eq!("uncolored".parse::<Color>().unwrap(), Color::Uncolored);
        assert!("green".parse::<Color>().is_err());
    }
}
