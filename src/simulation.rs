//! End-to-end simulation runs and their reports

use crate::{
    config::SimulationConfig,
    consensus::{DecisionPolicy, Protocol},
    error::Result,
    network::Network,
    query::SimulatedTransport,
    scheduler::RoundScheduler,
    types::{Color, RunId},
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Node count per color
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorCounts {
    pub uncolored: usize,
    pub a: usize,
    pub b: usize,
}

impl FromIterator<Color> for ColorCounts {
    fn from_iter<I: IntoIterator<Item = Color>>(iter: I) -> Self {
        let mut counts = ColorCounts::default();
        for color in iter {
            match color {
                Color::Uncolored => counts.uncolored += 1,
                Color::A => counts.a += 1,
                Color::B => counts.b += 1,
            }
        }
        counts
    }
}

/// Outcome of one simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub run_id: RunId,
    pub protocol: Protocol,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub rounds: u64,
    /// False when until-decided mode hit its round cap
    pub terminated: bool,
    /// Final color of every node, in arena order
    pub colors: Vec<Color>,
    pub counts: ColorCounts,
    pub decided: usize,
}

impl SimulationReport {
    /// Every node holds the same non-uncolored color
    pub fn converged(&self) -> bool {
        self.consensus_color().is_some()
    }

    /// The color the whole network agrees on, if any
    pub fn consensus_color(&self) -> Option<Color> {
        let first = *self.colors.first()?;
        if first.is_colored() && self.colors.iter().all(|c| *c == first) {
            Some(first)
        } else {
            None
        }
    }

    pub fn all_decided(&self) -> bool {
        self.decided == self.colors.len()
    }
}

/// One configured run over a network
pub struct Simulation {
    config: SimulationConfig,
    network: Arc<Network>,
    policy: Arc<dyn DecisionPolicy>,
    cancel: CancellationToken,
}

impl Simulation {
    /// Build the ring network described by `config`
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let cancel = CancellationToken::new();
        let transport = SimulatedTransport::new(config.latency.clone())
            .with_cancellation(cancel.clone());
        let network = Network::ring(config.node_count, Arc::new(transport))?;
        Ok(Self::assemble(config, network, cancel))
    }

    /// Run `config`'s protocol over a caller-built network. `node_count` and
    /// `latency` in `config` are ignored.
    ///
    /// The network's transport is not wired to [`Simulation::cancellation_token`]:
    /// cancelling stops the run between rounds but leaves in-flight queries
    /// alone. Build the transport with
    /// [`SimulatedTransport::with_cancellation`] and pass the same token to
    /// [`Simulation::with_network_and_cancellation`] to fail them too.
    pub fn with_network(config: SimulationConfig, network: Network) -> Result<Self> {
        Self::with_network_and_cancellation(config, network, CancellationToken::new())
    }

    /// Like [`Simulation::with_network`], with `cancel` as the run's token
    pub fn with_network_and_cancellation(
        config: SimulationConfig,
        network: Network,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, network, cancel))
    }

    fn assemble(config: SimulationConfig, network: Network, cancel: CancellationToken) -> Self {
        let policy = config.protocol.policy(config.beta);
        Self {
            config,
            network: Arc::new(network),
            policy,
            cancel,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    /// Token that aborts the run: the scheduler stops before the next round,
    /// and in-flight queries fail when the transport shares the token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self) -> Result<SimulationReport> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(
            run = %run_id,
            protocol = %self.config.protocol,
            nodes = self.network.len(),
            k = self.config.sample_size,
            alpha = self.config.alpha,
            "starting simulation"
        );

        let scheduler = RoundScheduler::new(
            Arc::clone(&self.network),
            Arc::clone(&self.policy),
            self.config.sample_size,
            self.config.alpha,
        )
        .with_cancellation(self.cancel.clone());
        let outcome = scheduler
            .run(self.config.rounds, self.config.max_rounds)
            .await?;

        let colors = self.network.colors().await;
        let decided = join_all(
            self.network
                .nodes()
                .iter()
                .map(|node| node.is_decided(self.policy.as_ref())),
        )
        .await
        .into_iter()
        .filter(|decided| *decided)
        .count();

        let report = SimulationReport {
            run_id,
            protocol: self.config.protocol,
            started_at,
            elapsed_ms: clock.elapsed().as_millis() as u64,
            rounds: outcome.rounds,
            terminated: outcome.terminated,
            counts: colors.iter().copied().collect(),
            colors,
            decided,
        };
        info!(
            run = %report.run_id,
            rounds = report.rounds,
            converged = report.converged(),
            "simulation finished"
        );
        Ok(report)
    }
}

/// Convergence statistics over repeated runs of one configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub protocol: Protocol,
    pub runs: usize,
    pub converged: usize,
    pub terminated: usize,
    pub convergence_rate: f64,
    pub mean_rounds: f64,
    pub max_rounds: u64,
}

impl BatchSummary {
    pub fn from_reports(protocol: Protocol, reports: &[SimulationReport]) -> Self {
        let runs = reports.len();
        let converged = reports.iter().filter(|r| r.converged()).count();
        let terminated = reports.iter().filter(|r| r.terminated).count();
        let total_rounds: u64 = reports.iter().map(|r| r.rounds).sum();
        let (convergence_rate, mean_rounds) = if runs == 0 {
            (0.0, 0.0)
        } else {
            (
                converged as f64 / runs as f64,
                total_rounds as f64 / runs as f64,
            )
        };
        Self {
            protocol,
            runs,
            converged,
            terminated,
            convergence_rate,
            mean_rounds,
            max_rounds: reports.iter().map(|r| r.rounds).max().unwrap_or(0),
        }
    }
}

/// Run `config` `runs` times, each on a fresh network, one after another
pub async fn run_batch(config: &SimulationConfig, runs: usize) -> Result<BatchSummary> {
    let mut reports = Vec::with_capacity(runs);
    for _ in 0..runs {
        let simulation = Simulation::new(config.clone())?;
        reports.push(simulation.run().await?);
    }
    let summary = BatchSummary::from_reports(config.protocol, &reports);
    info!(
        protocol = %summary.protocol,
        runs = summary.runs,
        converged = summary.converged,
        "batch finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(colors: Vec<Color>, rounds: u64) -> SimulationReport {
        SimulationReport {
            run_id: RunId::new(),
            protocol: Protocol::Slush,
            started_at: Utc::now(),
            elapsed_ms: 0,
            rounds,
            terminated: true,
            counts: colors.iter().copied().collect(),
            decided: 0,
            colors,
        }
    }

    #[test]
    fn uncolored_agreement_is_not_convergence() {
        assert!(!report(vec![Color::Uncolored; 3], 1).converged());
        assert!(!report(vec![Color::A, Color::B], 1).converged());
        assert_eq!(
            report(vec![Color::B; 4], 1).consensus_color(),
            Some(Color::B)
        );
    }

    #[test]
    fn batch_summary_rates() {
        let reports = vec![
            report(vec![Color::A; 2], 10),
            report(vec![Color::A, Color::B], 20),
        ];
        let summary = BatchSummary::from_reports(Protocol::Slush, &reports);
        assert_eq!(summary.converged, 1);
        assert_eq!(summary.convergence_rate, 0.5);
        assert_eq!(summary.mean_rounds, 15.0);
        assert_eq!(summary.max_rounds, 20);
    }
}
