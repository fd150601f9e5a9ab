//! Consensus node state machine

use crate::{
    consensus::{quorum_size, DecisionPolicy, Tally},
    network::Network,
    types::{Color, NodeId},
};
use futures::future::join_all;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Mutable state of one node. Only ever touched under the node's lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeState {
    /// Current color
    pub color: Color,

    /// Last color that won a quorum (Snowball)
    pub previous_proposal: Color,

    /// Rounds in which each color reached quorum (Snowball)
    pub confidence: BTreeMap<Color, u64>,

    /// Consecutive rounds supporting the favored color (Snowflake/Snowball)
    pub consecutive: u64,

    /// Latched once the streak exceeds beta
    pub decided: bool,
}

impl NodeState {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            previous_proposal: color,
            confidence: BTreeMap::new(),
            consecutive: 0,
            decided: false,
        }
    }

    pub fn confidence(&self, color: Color) -> u64 {
        self.confidence.get(&color).copied().unwrap_or(0)
    }

    /// Add one round of support for `color` and return its new confidence
    pub fn bump_confidence(&mut self, color: Color) -> u64 {
        let confidence = self.confidence.entry(color).or_insert(0);
        *confidence += 1;
        *confidence
    }

    /// First-mover adoption: an uncolored node takes the proposed color.
    /// No confidence is gained, so `previous_proposal` is left alone.
    fn adopt(&mut self, proposed: Color) {
        if self.color == Color::Uncolored && proposed.is_colored() {
            self.color = proposed;
        }
    }
}

impl Default for NodeState {
    fn default() -> Self {
        Self::new(Color::Uncolored)
    }
}

/// One consensus participant. Peers are arena indices into the owning
/// [`Network`] and never change after construction.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    peers: Vec<NodeId>,
    state: Mutex<NodeState>,
}

impl Node {
    pub fn new(id: NodeId, color: Color, peers: Vec<NodeId>) -> Self {
        Self {
            id,
            peers,
            state: Mutex::new(NodeState::new(color)),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn peers(&self) -> &[NodeId] {
        &self.peers
    }

    pub async fn color(&self) -> Color {
        self.state.lock().await.color
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> NodeState {
        self.state.lock().await.clone()
    }

    pub async fn is_decided(&self, policy: &dyn DecisionPolicy) -> bool {
        policy.is_decided(&*self.state.lock().await)
    }

    /// Answer a query: adopt `proposed` if uncolored, then report the color.
    pub async fn respond(&self, proposed: Color) -> Color {
        let mut state = self.state.lock().await;
        state.adopt(proposed);
        state.color
    }

    /// Like [`Node::respond`], but keeps the lock for the whole simulated
    /// delay, so the node services one query at a time.
    pub async fn respond_holding_lock(&self, proposed: Color, delay: Duration) -> Color {
        let mut state = self.state.lock().await;
        tokio::time::sleep(delay).await;
        state.adopt(proposed);
        state.color
    }

    /// Pick at most `k` distinct peers uniformly at random
    pub fn sample_peers(&self, k: usize) -> Vec<NodeId> {
        let mut rng = rand::thread_rng();
        self.peers.choose_multiple(&mut rng, k).copied().collect()
    }

    /// Run one round: sample peers, query them concurrently, then apply the
    /// decision policy to whatever answered in time.
    ///
    /// Uncolored nodes never initiate rounds.
    pub async fn tick(&self, network: &Network, k: usize, alpha: f64, policy: &dyn DecisionPolicy) {
        let proposed = self.color().await;
        if !proposed.is_colored() {
            return;
        }

        let sample = self.sample_peers(k);
        let queries = sample.iter().filter_map(|peer| network.node(*peer)).map(|target| async move {
            (target.id(), network.transport().query(target, proposed).await)
        });

        let mut tally = Tally::new();
        for (peer, response) in join_all(queries).await {
            match response {
                Ok(color) => tally.add(color),
                Err(err) => trace!(node = %self.id, peer = %peer, "dropping response: {}", err),
            }
        }

        let quorum = quorum_size(k, alpha);
        let mut state = self.state.lock().await;
        let before = state.color;
        let was_decided = state.decided;
        policy.apply(&mut state, &tally, quorum);

        if state.color != before {
            debug!(node = %self.id, tally = %tally, "color {} -> {}", before, state.color);
        }
        if state.decided && !was_decided {
            debug!(node = %self.id, color = %state.color, streak = state.consecutive, "decided");
        }
    }
}
