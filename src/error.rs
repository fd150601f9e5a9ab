//! Error types for the snowsim library

use std::time::Duration;
use thiserror::Error;

/// Result type alias for snowsim operations
pub type Result<T> = std::result::Result<T, SnowsimError>;

/// Main error type for snowsim operations
#[derive(Error, Debug)]
pub enum SnowsimError {
    /// Query-related errors
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// The run was cancelled before it terminated
    #[error("Simulation cancelled after {rounds} rounds")]
    Cancelled { rounds: u64 },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with message
    #[error("{0}")]
    Generic(String),
}

/// Failures of a single query between two nodes.
///
/// Both variants mean "no answer": a round update drops the response and
/// carries on with whatever else came back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The responder did not answer before the deadline
    #[error("Query timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// The run was cancelled while the query was in flight
    #[error("Query cancelled")]
    Cancelled,
}

impl SnowsimError {
    /// Create a validation error
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        SnowsimError::Validation(msg.into())
    }

    /// Create a configuration error
    pub fn config<T: Into<String>>(msg: T) -> Self {
        SnowsimError::Config(msg.into())
    }

    /// Create a generic error
    pub fn generic<T: Into<String>>(msg: T) -> Self {
        SnowsimError::Generic(msg.into())
    }
}
