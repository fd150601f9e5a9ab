//! Snowsim CLI application

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use snowsim::{run_batch, Protocol, Simulation, SimulationConfig};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "snowsim-cli")]
#[command(about = "Simulate Slush, Snowflake and Snowball consensus over an in-memory network")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Set verbosity level (0-4)
    #[arg(short, long, default_value_t = 2, global = true)]
    verbosity: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single simulation and print every node's final color
    Run(RunArgs),
    /// Run a configuration repeatedly and report the convergence rate
    Batch {
        #[command(flatten)]
        args: RunArgs,

        /// Number of runs
        #[arg(short = 'r', long, default_value_t = 100)]
        runs: usize,
    },
    /// Print the default configuration as JSON
    Config,
    /// Show version information
    Version,
}

#[derive(Args, Clone)]
struct RunArgs {
    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Protocol variant
    #[arg(short, long, value_enum)]
    protocol: Option<Protocol>,

    /// Number of nodes
    #[arg(short = 'n', long)]
    nodes: Option<usize>,

    /// Sample size (k)
    #[arg(short = 'k', long)]
    sample_size: Option<usize>,

    /// Quorum fraction (alpha)
    #[arg(short, long)]
    alpha: Option<f64>,

    /// Decision threshold (beta)
    #[arg(short, long)]
    beta: Option<u64>,

    /// Fixed number of rounds for slush (M)
    #[arg(short = 'm', long)]
    rounds: Option<u64>,

    /// Give up after this many rounds in until-decided mode
    #[arg(long)]
    max_rounds: Option<u64>,

    /// Hold the responder's lock for the whole simulated latency
    #[arg(long)]
    coarse_locking: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn resolve(&self) -> anyhow::Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::load(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => SimulationConfig::default(),
        };

        if let Some(protocol) = self.protocol {
            config.protocol = protocol;
        }
        if let Some(nodes) = self.nodes {
            config.node_count = nodes;
        }
        if let Some(k) = self.sample_size {
            config.sample_size = k;
        }
        if let Some(alpha) = self.alpha {
            config.alpha = alpha;
        }
        if let Some(beta) = self.beta {
            config.beta = beta;
        }
        if let Some(rounds) = self.rounds {
            config.rounds = rounds;
        }
        if self.max_rounds.is_some() {
            config.max_rounds = self.max_rounds;
        }
        if self.coarse_locking {
            config.latency.coarse_locking = true;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        Level::DEBUG
    } else {
        match cli.verbosity {
            0 => Level::ERROR,
            1 => Level::WARN,
            2 => Level::INFO,
            3 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    match cli.command {
        Some(Commands::Run(args)) => {
            let config = args.resolve()?;
            let simulation = Simulation::new(config)?;

            let cancel = simulation.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted, cancelling simulation");
                    cancel.cancel();
                }
            });

            let report = simulation.run().await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for (i, color) in report.colors.iter().enumerate() {
                    println!("node {} color={}", i + 1, color);
                }
                match report.consensus_color() {
                    Some(color) => info!(rounds = report.rounds, "network converged on {}", color),
                    None => info!(rounds = report.rounds, counts = ?report.counts, "network did not converge"),
                }
            }
        },
        Some(Commands::Batch { args, runs }) => {
            let config = args.resolve()?;
            let summary = run_batch(&config, runs).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "{}: {}/{} runs converged ({:.1}%), mean rounds {:.1}, max rounds {}",
                    summary.protocol,
                    summary.converged,
                    summary.runs,
                    summary.convergence_rate * 100.0,
                    summary.mean_rounds,
                    summary.max_rounds
                );
            }
        },
        Some(Commands::Config) => {
            println!("{}", serde_json::to_string_pretty(&SimulationConfig::default())?);
        },
        Some(Commands::Version) => {
            println!("Snowsim v{}", snowsim::VERSION);
        },
        None => {
            let report = Simulation::new(SimulationConfig::default())?.run().await?;
            for (i, color) in report.colors.iter().enumerate() {
                println!("node {} color={}", i + 1, color);
            }
        },
    }

    Ok(())
}
