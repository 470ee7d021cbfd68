use std::path::PathBuf;

use anyhow::bail;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nakamoto_sim::output;
use nakamoto_sim::prelude::*;

/// Discrete-event Nakamoto proof-of-work fairness simulator.
#[derive(Debug, Parser)]
#[command(name = "nakamoto-sim", version)]
struct Cli {
    /// Chain flavor: BTC, bitcoin, ETH or ethereum.
    flavor: Option<String>,

    /// Fork tie rule: first_seen, random or last_generated.
    #[arg(long, default_value = "first_seen")]
    rule: String,

    /// Disable dynamic difficulty adjustment.
    #[arg(long)]
    static_difficulty: bool,

    /// Number of mining nodes.
    #[arg(long, default_value_t = 20)]
    nodes: usize,

    /// Hash-rate share of the dominant miner, in percent.
    #[arg(long, default_value_t = 30.0)]
    dominant_share: f64,

    /// Use the measured real-world pool distribution instead of a
    /// dominant-share split.
    #[arg(long)]
    measured_hashrates: bool,

    /// Base PRNG seed of the sweep.
    #[arg(long, default_value_t = 10)]
    seed: u64,

    /// Block height each run stops at.
    #[arg(long, default_value_t = 100_000)]
    end_round: u64,

    /// Root directory for the timestamped output directory.
    #[arg(long, default_value = "data")]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let flavor = match cli.flavor.as_deref() {
        None | Some("BTC") | Some("bitcoin") => ChainFlavor::bitcoin(),
        Some("ETH") | Some("ethereum") => ChainFlavor::ethereum(),
        Some(other) => {
            warn!("unknown chain flavor {other:?}; usage: nakamoto-sim [BTC|ETH|bitcoin|ethereum]");
            warn!("falling back to bitcoin");
            ChainFlavor::bitcoin()
        }
    };

    let tie_rule = match cli.rule.as_str() {
        "first_seen" => TieRule::FirstSeen,
        "random" => TieRule::Random,
        "last_generated" => TieRule::LastGenerated,
        other => bail!("unknown tie rule {other:?} (expected first_seen, random or last_generated)"),
    };

    let hashrate_dist = if cli.measured_hashrates {
        HashrateDistribution::Measured
    } else {
        HashrateDistribution::Dominant {
            share: cli.dominant_share,
        }
    };

    let simulation = Simulation::builder()
        .flavor(flavor)
        .nodes(cli.nodes)
        .hashrate_dist(hashrate_dist)
        .tie_rule(tie_rule)
        .dynamic_difficulty(!cli.static_difficulty)
        .end_round(cli.end_round)
        .seed(cli.seed)
        .build()?;

    info!(
        flavor = flavor.name(),
        nodes = simulation.node_count(),
        delays = simulation.delays().len(),
        rule = tie_rule.rule_name(),
        "starting delay sweep"
    );

    let sweep = simulation.run_sweep();

    let dir = output::create_timestamp_dir(&cli.out)?;
    output::write_sweep(&dir, &sweep)?;

    info!("all simulations finished; results in {}", dir.display());
    Ok(())
}
