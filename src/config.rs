//! Simulation configuration

use crate::consensus::{quorum_size, Protocol};
use crate::error::{Result, SnowsimError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default number of nodes in the network
pub const DEFAULT_NODE_COUNT: usize = 20;

/// Default sample size (k)
pub const DEFAULT_SAMPLE_SIZE: usize = 5;

/// Default quorum fraction (alpha)
pub const DEFAULT_ALPHA: f64 = 0.7;

/// Default decision threshold (beta)
pub const DEFAULT_BETA: u64 = 4;

/// Default number of fixed rounds (M)
pub const DEFAULT_ROUNDS: u64 = 20;

/// Simulated network latency and per-query deadline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Fixed part of every response delay (milliseconds)
    pub base_ms: u64,

    /// Largest uniform jitter added on top of the base, inclusive (milliseconds)
    pub max_jitter_ms: u64,

    /// Deadline for a single query (milliseconds)
    pub query_timeout_ms: u64,

    /// Hold the responder's lock for the whole simulated delay
    pub coarse_locking: bool,
}

impl LatencyConfig {
    pub fn base(&self) -> Duration {
        Duration::from_millis(self.base_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            base_ms: 5,
            max_jitter_ms: 9,
            query_timeout_ms: 100,
            coarse_locking: false,
        }
    }
}

/// Parameters for a single simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Active decision policy
    pub protocol: Protocol,

    /// Number of nodes in the ring
    pub node_count: usize,

    /// Sample size (k)
    pub sample_size: usize,

    /// Quorum fraction (alpha)
    pub alpha: f64,

    /// Decision threshold (beta), Snowflake and Snowball only
    pub beta: u64,

    /// Fixed round count (M), Slush only
    pub rounds: u64,

    /// Upper bound on rounds in until-decided mode
    pub max_rounds: Option<u64>,

    /// Network latency model
    pub latency: LatencyConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Snowball,
            node_count: DEFAULT_NODE_COUNT,
            sample_size: DEFAULT_SAMPLE_SIZE,
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            rounds: DEFAULT_ROUNDS,
            max_rounds: None,
            latency: LatencyConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Create a configuration with default parameters for a protocol
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            ..Default::default()
        }
    }

    /// Set the number of nodes
    pub fn with_node_count(mut self, node_count: usize) -> Self {
        self.node_count = node_count;
        self
    }

    /// Set the sample size
    pub fn with_sample_size(mut self, k: usize) -> Self {
        self.sample_size = k;
        self
    }

    /// Set the quorum fraction
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the decision threshold
    pub fn with_beta(mut self, beta: u64) -> Self {
        self.beta = beta;
        self
    }

    /// Set the fixed round count
    pub fn with_rounds(mut self, rounds: u64) -> Self {
        self.rounds = rounds;
        self
    }

    /// Cap the number of rounds in until-decided mode
    pub fn with_max_rounds(mut self, max_rounds: u64) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    /// Set the latency model
    pub fn with_latency(mut self, latency: LatencyConfig) -> Self {
        self.latency = latency;
        self
    }

    /// Responses needed for one color to reach quorum
    pub fn quorum_size(&self) -> usize {
        quorum_size(self.sample_size, self.alpha)
    }

    /// Check the parameters before a run
    pub fn validate(&self) -> Result<()> {
        if self.node_count < 2 {
            return Err(SnowsimError::config("node_count must be at least 2"));
        }
        if self.sample_size == 0 {
            return Err(SnowsimError::config("sample_size (k) must be positive"));
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(SnowsimError::config(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        if self.protocol == Protocol::Slush && self.rounds == 0 {
            return Err(SnowsimError::config("rounds (M) must be positive for slush"));
        }
        if self.max_rounds == Some(0) {
            return Err(SnowsimError::config("max_rounds must be positive when set"));
        }
        if self.latency.query_timeout_ms == 0 {
            return Err(SnowsimError::config("query_timeout_ms must be positive"));
        }
        Ok(())
    }

    /// Load and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: SimulationConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
