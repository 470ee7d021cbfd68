use crate::{
    difficulty::ChainFlavor,
    power_dist::{Hashrate, HashrateDistribution, HashrateDistributionError},
    tie_breaker::TieRule,
};

use super::{Simulation, DEFAULT_END_ROUND, DEFAULT_NODE_COUNT, DEFAULT_SEED, MAX_NODES};

/// Builds a [`Simulation`].
#[derive(Debug, Clone)]
pub struct SimulationBuilder {
    flavor: ChainFlavor,
    node_count: usize,
    hashrate_dist: HashrateDistribution,
    delays: Option<Vec<u64>>,
    tie_rule: TieRule,
    dynamic_difficulty: bool,
    end_round: u64,
    seed: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationBuildError {
    #[error("node count {0} exceeds the supported maximum {MAX_NODES}")]
    TooManyNodes(usize),
    #[error("the delay sweep must contain at least one value")]
    EmptyDelayList,
    #[error("number of simulated rounds must be greater than 0")]
    ZeroRounds,
    #[error(transparent)]
    HashrateDistributionError(#[from] HashrateDistributionError),
}

impl SimulationBuilder {
    /// Creates a new [`SimulationBuilder`] with the default configuration:
    /// Bitcoin flavor, 20 nodes, a 30% dominant miner, the flavor's
    /// default delay sweep, first-seen ties and dynamic difficulty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the simulated chain flavor.
    pub fn flavor(mut self, flavor: ChainFlavor) -> Self {
        self.flavor = flavor;

        self
    }

    /// Sets the number of mining nodes.
    pub fn nodes(mut self, count: usize) -> Self {
        self.node_count = count;

        self
    }

    /// Distributes hash rate according to the given distribution.
    pub fn hashrate_dist(mut self, dist: HashrateDistribution) -> Self {
        self.hashrate_dist = dist;

        self
    }

    /// Sets every node's hash rate explicitly. The node count follows the
    /// vector's length.
    pub fn hashrates<I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = Hashrate>,
    {
        let values: Vec<_> = values.into_iter().collect();
        self.node_count = values.len();
        self.hashrate_dist = HashrateDistribution::Values(values);

        self
    }

    /// Sets the propagation delays to sweep over, in milliseconds. The
    /// flavor's default sweep is used otherwise.
    pub fn delays<I>(mut self, delays: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        self.delays = Some(delays.into_iter().collect());

        self
    }

    /// Sets the fork tie rule applied by every node.
    pub fn tie_rule(mut self, rule: TieRule) -> Self {
        self.tie_rule = rule;

        self
    }

    /// Enables or disables dynamic difficulty adjustment (Bitcoin flavor
    /// only; with it disabled every retarget resets to difficulty 1.0).
    pub fn dynamic_difficulty(mut self, enabled: bool) -> Self {
        self.dynamic_difficulty = enabled;

        self
    }

    /// Sets the block height each run stops at.
    pub fn end_round(mut self, end_round: u64) -> Self {
        self.end_round = end_round;

        self
    }

    /// Seeds the sweep's PRNG streams. Run `k` of the sweep draws from a
    /// stream seeded with `seed + k`.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;

        self
    }

    /// Creates a [`Simulation`] from the specified parameters.
    pub fn build(self) -> Result<Simulation, SimulationBuildError> {
        use SimulationBuildError::*;

        let SimulationBuilder {
            flavor,
            node_count,
            hashrate_dist,
            delays,
            tie_rule,
            dynamic_difficulty,
            end_round,
            seed,
        } = self;

        if node_count > MAX_NODES {
            return Err(TooManyNodes(node_count));
        }
        if end_round == 0 {
            return Err(ZeroRounds);
        }

        let delays = delays.unwrap_or_else(|| flavor.default_delays());
        if delays.is_empty() {
            return Err(EmptyDelayList);
        }

        let hashrates = hashrate_dist.values(node_count)?;
        let total_hashrate = hashrates.iter().sum();
        let advantaged_node = HashrateDistribution::advantaged_node(&hashrates);

        Ok(Simulation {
            flavor,
            node_count,
            hashrates,
            total_hashrate,
            advantaged_node,
            delays,
            tie_rule,
            dynamic_difficulty,
            end_round,
            seed,
        })
    }
}

impl Default for SimulationBuilder {
    fn default() -> Self {
        SimulationBuilder {
            flavor: ChainFlavor::bitcoin(),
            node_count: DEFAULT_NODE_COUNT,
            hashrate_dist: HashrateDistribution::default(),
            delays: None,
            tie_rule: TieRule::default(),
            dynamic_difficulty: true,
            end_round: DEFAULT_END_ROUND,
            seed: DEFAULT_SEED,
        }
    }
}
