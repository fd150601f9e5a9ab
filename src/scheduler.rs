//! Round scheduler: drives synchronized rounds across the network

use crate::{
    consensus::DecisionPolicy,
    error::{Result, SnowsimError},
    network::Network,
    types::NodeId,
};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a scheduler run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Rounds executed
    pub rounds: u64,

    /// False only when until-decided mode stopped at its round cap
    pub terminated: bool,
}

/// Drives rounds over a shared network.
///
/// Each round spawns one task per active node and waits for all of them
/// before the next round starts. Nodes within a round run in parallel and
/// in no particular order.
pub struct RoundScheduler {
    network: Arc<Network>,
    policy: Arc<dyn DecisionPolicy>,
    sample_size: usize,
    alpha: f64,
    cancel: CancellationToken,
}

impl RoundScheduler {
    pub fn new(
        network: Arc<Network>,
        policy: Arc<dyn DecisionPolicy>,
        sample_size: usize,
        alpha: f64,
    ) -> Self {
        Self {
            network,
            policy,
            sample_size,
            alpha,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between rounds once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run in the mode the active policy calls for: `rounds` fixed rounds for
    /// policies that never decide, otherwise until every node has decided.
    pub async fn run(&self, rounds: u64, max_rounds: Option<u64>) -> Result<RunOutcome> {
        if self.policy.runs_until_decided() {
            self.run_until_decided(max_rounds).await
        } else {
            self.run_fixed(rounds).await
        }
    }

    /// Tick every node concurrently, exactly `rounds` times
    pub async fn run_fixed(&self, rounds: u64) -> Result<RunOutcome> {
        let all: Vec<NodeId> = self.network.ids().collect();
        for round in 0..rounds {
            self.check_cancelled(round)?;
            self.run_round(&all).await?;
            info!("finished round {}", round + 1);
        }
        Ok(RunOutcome {
            rounds,
            terminated: true,
        })
    }

    /// Repeat rounds over the undecided nodes until none are left.
    ///
    /// A node that starts uncolored and is never queried never decides; pass
    /// `max_rounds` to bound such runs.
    pub async fn run_until_decided(&self, max_rounds: Option<u64>) -> Result<RunOutcome> {
        let mut undecided = Vec::new();
        for node in self.network.nodes() {
            if !node.is_decided(self.policy.as_ref()).await {
                undecided.push(node.id());
            }
        }

        info!(undecided = undecided.len(), "waiting for nodes to decide...");

        let mut rounds = 0;
        while !undecided.is_empty() {
            if max_rounds.is_some_and(|cap| rounds >= cap) {
                warn!(
                    rounds,
                    undecided = undecided.len(),
                    "round cap reached before every node decided"
                );
                return Ok(RunOutcome {
                    rounds,
                    terminated: false,
                });
            }
            self.check_cancelled(rounds)?;

            self.run_round(&undecided).await?;
            rounds += 1;

            let mut still_undecided = Vec::with_capacity(undecided.len());
            for id in undecided {
                if let Some(node) = self.network.node(id) {
                    if !node.is_decided(self.policy.as_ref()).await {
                        still_undecided.push(id);
                    }
                }
            }
            debug!(
                round = rounds,
                decided = self.network.len() - still_undecided.len(),
                "round complete"
            );
            undecided = still_undecided;
        }

        info!(rounds, "all nodes decided");
        Ok(RunOutcome {
            rounds,
            terminated: true,
        })
    }

    /// One synchronized round over `ids`: spawn a task per node and wait for
    /// all of them.
    pub async fn run_round(&self, ids: &[NodeId]) -> Result<()> {
        let mut tasks = JoinSet::new();
        for &id in ids {
            let network = Arc::clone(&self.network);
            let policy = Arc::clone(&self.policy);
            let (k, alpha) = (self.sample_size, self.alpha);
            tasks.spawn(async move {
                network.tick(id, k, alpha, policy.as_ref()).await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            joined.map_err(|e| SnowsimError::generic(format!("node task failed: {}", e)))?;
        }
        Ok(())
    }

    fn check_cancelled(&self, rounds: u64) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(SnowsimError::Cancelled { rounds });
        }
        Ok(())
    }
}
