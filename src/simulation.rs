//! Building and running delay-sweep simulations

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::Exp1;
use rayon::prelude::*;
use tracing::info;

use crate::{
    block::{Block, BlockId, NodeId},
    blockchain::Blockchain,
    difficulty::ChainFlavor,
    event::{EventKind, EventQueue},
    finality::FinalityTracker,
    power_dist::Hashrate,
    tie_breaker::TieRule,
};

pub mod builder;
pub mod results;

pub use builder::{SimulationBuildError, SimulationBuilder};
pub use results::{DeltaResult, RunRecord, ShareCurve, SweepResults};

/// Largest supported number of mining nodes.
pub const MAX_NODES: usize = 1_000;

/// Default block height each run stops at.
pub const DEFAULT_END_ROUND: u64 = 100_000;

/// Default node count.
pub const DEFAULT_NODE_COUNT: usize = 20;

/// Default PRNG seed.
pub const DEFAULT_SEED: u64 = 10;

/// A configured delay sweep over the mining fairness simulation.
///
/// Each configured propagation delay is simulated as one independent,
/// reproducible run; [`Simulation::run_sweep`] executes the runs in
/// parallel and collects their records in sweep order.
#[derive(Debug, Clone)]
pub struct Simulation {
    flavor: ChainFlavor,
    node_count: usize,
    hashrates: Vec<Hashrate>,
    total_hashrate: Hashrate,
    advantaged_node: NodeId,
    delays: Vec<u64>,
    tie_rule: TieRule,
    dynamic_difficulty: bool,
    end_round: u64,
    seed: u64,
}

impl Simulation {
    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::new()
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// The node the fairness metrics single out: the one with the largest
    /// hash rate.
    #[inline]
    pub fn advantaged_node(&self) -> NodeId {
        self.advantaged_node
    }

    #[inline]
    pub fn delays(&self) -> &[u64] {
        &self.delays
    }

    /// Runs one simulation per configured delay and returns the records in
    /// sweep order.
    ///
    /// Run `k` draws from its own PRNG stream seeded with `seed + k`, so
    /// the sweep is reproducible independently of scheduling.
    pub fn run_sweep(&self) -> SweepResults {
        let runs: Vec<RunRecord> = self
            .delays
            .par_iter()
            .enumerate()
            .map(|(k, &delay)| Run::new(self, delay, self.seed.wrapping_add(k as u64)).execute())
            .collect();

        SweepResults::new(
            self.flavor.name(),
            self.node_count,
            self.end_round,
            self.tie_rule.rule_name(),
            if self.dynamic_difficulty {
                "dynamic"
            } else {
                "static"
            },
            runs,
        )
    }
}

/// Mutable state of a single run at a fixed propagation delay.
struct Run<'a> {
    sim: &'a Simulation,
    delay: u64,
    rng: StdRng,
    chain: Blockchain,
    queue: EventQueue,
    /// Each node's current best observed block.
    tips: Vec<BlockId>,
    /// Each node's current mining token; a popped mining event is executed
    /// only if it carries the node's current token.
    tokens: Vec<u64>,
    finality: FinalityTracker,
    /// Current virtual time, in milliseconds. Set from each popped event
    /// and never decreasing.
    now: u64,
    /// Highest block height seen so far.
    max_height: u64,
    last_mint_time: Option<u64>,
    interval_sum: u128,
    interval_count: u64,
}

impl<'a> Run<'a> {
    fn new(sim: &'a Simulation, delay: u64, seed: u64) -> Self {
        let chain = Blockchain::new();
        let genesis = chain.genesis();

        Run {
            sim,
            delay,
            rng: StdRng::seed_from_u64(seed),
            chain,
            queue: EventQueue::new(),
            tips: vec![genesis; sim.node_count],
            tokens: vec![0; sim.node_count],
            finality: FinalityTracker::new(sim.advantaged_node, sim.end_round),
            now: 0,
            max_height: 0,
            last_mint_time: None,
            interval_sum: 0,
            interval_count: 0,
        }
    }

    fn execute(mut self) -> RunRecord {
        info!(
            delay = self.delay,
            rule = self.sim.tie_rule.rule_name(),
            "starting simulation run"
        );

        for node in 0..self.sim.node_count {
            self.schedule_mining(node);
        }

        while self.max_height < self.sim.end_round {
            let Some(event) = self.queue.pop() else {
                info!(delay = self.delay, "simulation stopped: event queue drained");
                break;
            };
            self.now = event.time;

            match event.kind {
                EventKind::Mining { minter, token } => {
                    // Superseded mining events are dropped here.
                    if token == self.tokens[minter] {
                        self.on_mine(minter);
                    }
                }
                EventKind::Delivery { to, block, .. } => self.on_delivery(to, block),
            }
        }

        let avg_block_interval = if self.interval_count > 0 {
            self.interval_sum as f64 / self.interval_count as f64
        } else {
            0.0
        };
        let (counters, a_mined, tracked) = self.finality.into_parts();
        let record = RunRecord::new(
            self.delay,
            self.sim.end_round,
            counters,
            avg_block_interval,
            self.max_height,
            self.now,
            a_mined,
            tracked,
        );

        let r = record.result();
        info!(
            delay = r.delay,
            final_height = record.final_height,
            final_time_ms = record.final_time,
            pi_a = r.pi_a,
            pi_o = r.pi_o,
            w_a = r.w_a,
            w_o = r.w_o,
            r_a = r.r_a,
            avg_block_interval = r.avg_block_interval,
            "run complete"
        );

        record
    }

    /// Draws the node's next mining completion and schedules it, replacing
    /// any mining event the node had pending.
    ///
    /// The expected completion time scales with the target generation
    /// time, the node's inverse hash-rate share, and the difficulty its
    /// next block will be mined at.
    fn schedule_mining(&mut self, node: NodeId) {
        let difficulty =
            self.sim
                .flavor
                .next_difficulty(&self.chain, self.tips[node], self.sim.dynamic_difficulty);
        let base = self.sim.flavor.target_generation_ms() as f64 * self.sim.total_hashrate
            / self.sim.hashrates[node];
        let draw: f64 = self.rng.sample(Exp1);
        let mining_time = (draw * base * difficulty) as u64;

        self.tokens[node] += 1;
        self.queue.push(
            self.now + mining_time,
            EventKind::Mining {
                minter: node,
                token: self.tokens[node],
            },
        );
    }

    /// A mining event fired with the node's current token: mint a block on
    /// the node's tip and fan it out.
    fn on_mine(&mut self, minter: NodeId) {
        let parent_id = self.tips[minter];
        let parent = *self.chain.get(parent_id);
        let difficulty =
            self.sim
                .flavor
                .next_difficulty(&self.chain, parent_id, self.sim.dynamic_difficulty);

        let height = parent.height + 1;
        // The block right after a retarget boundary starts the next epoch
        // at the boundary block's generation time.
        let last_epoch_time = if height % self.sim.flavor.retarget_interval() == 1 {
            parent.time
        } else {
            parent.last_epoch_time
        };
        let rand = (self.rng.gen::<f64>() * (i64::MAX - 10) as f64) as u64;

        let block = self.chain.insert(Block {
            height,
            parent: Some(parent_id),
            minter: Some(minter),
            time: self.now,
            rand,
            difficulty,
            last_epoch_time,
            finalized: false,
        });
        self.tips[minter] = block;

        if self.chain.over_retention() {
            let min_tip = self.min_tip_height();
            self.chain.maintain(min_tip);
        }

        if let Some(last) = self.last_mint_time {
            self.interval_sum += (self.now - last) as u128;
            self.interval_count += 1;
        }
        self.last_mint_time = Some(self.now);

        // One delivery per node; the minter itself sees the block with
        // zero delay.
        for to in 0..self.sim.node_count {
            let delay = if to == minter { 0 } else { self.delay };
            self.queue.push(
                self.now + delay,
                EventKind::Delivery {
                    from: minter,
                    to,
                    block,
                },
            );
        }

        self.schedule_mining(minter);

        if height < self.sim.end_round {
            self.finality
                .observe_height(&mut self.chain, block, height, minter);
        }
        if height > self.max_height {
            self.max_height = height;
        }
        if height == self.sim.end_round {
            self.finality.finalize_terminal(&mut self.chain, block);
        }
    }

    /// A block arrived at `to`: apply fork-choice, and re-draw the node's
    /// mining event if its tip changed.
    fn on_delivery(&mut self, to: NodeId, block: BlockId) {
        let tip = self.tips[to];
        if block == tip {
            return;
        }

        let adopted = self
            .sim
            .tie_rule
            .adopts(self.chain.get(block), self.chain.get(tip), to);
        if adopted {
            self.tips[to] = block;
            self.schedule_mining(to);
        }
    }

    fn min_tip_height(&self) -> u64 {
        self.tips
            .iter()
            .map(|&tip| self.chain.get(tip).height)
            .min()
            .unwrap_or(0)
    }
}
