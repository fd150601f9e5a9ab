//! Node arena and static peer topology

use crate::{
    consensus::DecisionPolicy,
    error::{Result, SnowsimError},
    node::{Node, NodeState},
    query::{QueryTransport, SimulatedTransport},
    types::{Color, NodeId},
};
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;

/// All nodes of a simulation plus the transport they query each other over.
///
/// Nodes live in an arena and refer to their peers by [`NodeId`], so the
/// (usually cyclic) peer graph needs no shared ownership.
pub struct Network {
    nodes: Vec<Node>,
    transport: Arc<dyn QueryTransport>,
}

impl Network {
    /// Create a builder for a network
    pub fn builder() -> NetworkBuilder {
        NetworkBuilder::new()
    }

    /// Ring-overlapping topology: node `i` peers with `(i + j) mod (n / 2)` for
    /// `j` in `[0, n / 2)`, seeded `A`/`B` by index parity.
    pub fn ring(node_count: usize, transport: Arc<dyn QueryTransport>) -> Result<Self> {
        NetworkBuilder::new().ring(node_count).with_transport(transport).build()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(Node::id)
    }

    pub fn transport(&self) -> &dyn QueryTransport {
        self.transport.as_ref()
    }

    /// Run one round for a single node. Unknown ids are ignored.
    pub async fn tick(&self, id: NodeId, k: usize, alpha: f64, policy: &dyn DecisionPolicy) {
        if let Some(node) = self.node(id) {
            node.tick(self, k, alpha, policy).await;
        }
    }

    /// Current color of every node, in arena order
    pub async fn colors(&self) -> Vec<Color> {
        join_all(self.nodes.iter().map(Node::color)).await
    }

    /// Current state of every node, in arena order
    pub async fn snapshots(&self) -> Vec<NodeState> {
        join_all(self.nodes.iter().map(Node::snapshot)).await
    }
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

/// Builder for networks
pub struct NetworkBuilder {
    seeds: Vec<Color>,
    peers: Vec<Vec<usize>>,
    transport: Option<Arc<dyn QueryTransport>>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self {
            seeds: Vec::new(),
            peers: Vec::new(),
            transport: None,
        }
    }

    /// Append a node with a seed color and peers given by arena index
    pub fn node(mut self, color: Color, peers: impl IntoIterator<Item = usize>) -> Self {
        self.seeds.push(color);
        self.peers.push(peers.into_iter().collect());
        self
    }

    /// Append `node_count` nodes wired as a ring (see [`Network::ring`])
    pub fn ring(mut self, node_count: usize) -> Self {
        let half = node_count / 2;
        for i in 0..node_count {
            self = self.node(Color::seed_for(i), (0..half).map(move |j| (i + j) % half));
        }
        self
    }

    /// Set the query transport
    pub fn with_transport(mut self, transport: Arc<dyn QueryTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the network, checking that every peer index exists
    pub fn build(self) -> Result<Network> {
        if self.seeds.is_empty() {
            return Err(SnowsimError::validation("network needs at least one node"));
        }

        let count = self.seeds.len();
        let mut nodes = Vec::with_capacity(count);
        for (index, (color, peers)) in self.seeds.into_iter().zip(self.peers).enumerate() {
            if let Some(missing) = peers.iter().find(|peer| **peer >= count) {
                return Err(SnowsimError::validation(format!(
                    "node {} lists unknown peer {} (network has {} nodes)",
                    index + 1,
                    missing + 1,
                    count
                )));
            }
            let peers = peers.into_iter().map(NodeId).collect();
            nodes.push(Node::new(NodeId(index), color, peers));
        }

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(SimulatedTransport::default()));

        Ok(Network { nodes, transport })
    }
}

impl Default for NetworkBuilder {
    fn default() -> Self {
        Self::new()
    }
}
