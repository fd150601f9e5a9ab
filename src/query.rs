//! Simulated point-to-point queries between nodes

use crate::config::LatencyConfig;
use crate::error::QueryError;
use crate::node::Node;
use crate::types::{Color, NodeId};
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Transport used by a node to ask a peer for its color.
///
/// Servicing a query may change the target: an uncolored target adopts the
/// proposed color. Implementations must be safe under arbitrary concurrent
/// callers to the same target.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn query(&self, target: &Node, proposed: Color) -> Result<Color, QueryError>;
}

/// In-memory transport with a random response delay and a per-query deadline
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    latency: LatencyConfig,
    fixed_delays: HashMap<NodeId, Duration>,
    cancel: CancellationToken,
}

impl SimulatedTransport {
    pub fn new(latency: LatencyConfig) -> Self {
        Self {
            latency,
            fixed_delays: HashMap::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Fail in-flight and future queries with [`QueryError::Cancelled`] once
    /// `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the random delay for queries sent to `target`.
    pub fn with_fixed_delay(mut self, target: NodeId, delay: Duration) -> Self {
        self.fixed_delays.insert(target, delay);
        self
    }

    /// Draw the response delay for a query to `target`
    pub fn response_delay(&self, target: NodeId) -> Duration {
        if let Some(delay) = self.fixed_delays.get(&target) {
            return *delay;
        }
        let jitter = rand::thread_rng().gen_range(0..=self.latency.max_jitter_ms);
        self.latency.base() + Duration::from_millis(jitter)
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new(LatencyConfig::default())
    }
}

#[async_trait]
impl QueryTransport for SimulatedTransport {
    async fn query(&self, target: &Node, proposed: Color) -> Result<Color, QueryError> {
        let deadline = self.latency.query_timeout();
        let delay = self.response_delay(target.id());

        let exchange = async {
            if self.latency.coarse_locking {
                target.respond_holding_lock(proposed, delay).await
            } else {
                tokio::time::sleep(delay).await;
                target.respond(proposed).await
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(QueryError::Cancelled),
            response = tokio::time::timeout(deadline, exchange) => {
                response.map_err(|_| QueryError::Timeout { duration: deadline })
            }
        }
    }
}
