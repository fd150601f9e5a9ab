//! Snowsim - a simulator for the Slush, Snowflake and Snowball metastable
//! consensus protocols over an in-memory peer network

// Modules
pub mod config;
pub mod consensus;
pub mod error;
pub mod network;
pub mod node;
pub mod query;
pub mod scheduler;
pub mod simulation;
pub mod types;

// Re-exports
pub use config::{LatencyConfig, SimulationConfig};
pub use consensus::{DecisionPolicy, Protocol, Tally};
pub use error::{QueryError, Result, SnowsimError};
pub use network::{Network, NetworkBuilder};
pub use node::{Node, NodeState};
pub use query::{QueryTransport, SimulatedTransport};
pub use scheduler::{RoundScheduler, RunOutcome};
pub use simulation::{run_batch, BatchSummary, Simulation, SimulationReport};
pub use types::{Color, NodeId, RunId};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
