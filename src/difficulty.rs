//! Chain-flavor difficulty models

use crate::{
    block::BlockId,
    blockchain::Blockchain,
};

/// Target block generation time of the Bitcoin flavor, in milliseconds.
pub const BITCOIN_TARGET_GENERATION_MS: u64 = 600_000;
/// Number of blocks between Bitcoin difficulty retargets.
pub const BITCOIN_RETARGET_INTERVAL: u64 = 2_016;
/// Target block generation time of the Ethereum flavor, in milliseconds.
pub const ETHEREUM_TARGET_GENERATION_MS: u64 = 15_000;

/// Smallest difficulty the Ethereum flavor will drift down to.
const ETHEREUM_MIN_DIFFICULTY: f64 = 0.1;

/// The difficulty rules of the simulated chain.
///
/// Bitcoin retargets once per epoch from the epoch's wall time; Ethereum
/// drifts on every block from the parent interval, with an uncle bonus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChainFlavor {
    Bitcoin {
        /// Blocks per retarget epoch.
        retarget_interval: u64,
        /// Intended duration of one epoch, in milliseconds.
        target_timespan: u64,
    },
    Ethereum,
}

impl ChainFlavor {
    /// The Bitcoin flavor at its production parameters: a 2016-block epoch
    /// targeting two weeks.
    pub fn bitcoin() -> Self {
        ChainFlavor::Bitcoin {
            retarget_interval: BITCOIN_RETARGET_INTERVAL,
            target_timespan: BITCOIN_RETARGET_INTERVAL * BITCOIN_TARGET_GENERATION_MS,
        }
    }

    pub fn ethereum() -> Self {
        ChainFlavor::Ethereum
    }

    /// Flavor name as used in output file names.
    pub fn name(&self) -> &'static str {
        match self {
            ChainFlavor::Bitcoin { .. } => "bitcoin",
            ChainFlavor::Ethereum => "ethereum",
        }
    }

    /// Target block generation time, in milliseconds.
    #[inline]
    pub fn target_generation_ms(&self) -> u64 {
        match self {
            ChainFlavor::Bitcoin { .. } => BITCOIN_TARGET_GENERATION_MS,
            ChainFlavor::Ethereum => ETHEREUM_TARGET_GENERATION_MS,
        }
    }

    /// Blocks between difficulty adjustments. The Ethereum flavor adjusts
    /// on every block.
    #[inline]
    pub fn retarget_interval(&self) -> u64 {
        match self {
            ChainFlavor::Bitcoin {
                retarget_interval, ..
            } => *retarget_interval,
            ChainFlavor::Ethereum => 1,
        }
    }

    /// The default propagation-delay sweep for this flavor: fractions
    /// T/10..T/2 of the target generation time T, then T, then half-step
    /// multiples up to 10T.
    pub fn default_delays(&self) -> Vec<u64> {
        let t = self.target_generation_ms();
        let mut delays: Vec<u64> = (2..=10).rev().map(|div| t / div).collect();
        delays.push(t);
        delays.extend((3..=20).map(|half| t * half / 2));
        delays
    }

    /// Difficulty of the block that would extend `tip`.
    ///
    /// `dynamic` only affects the Bitcoin flavor: with it disabled, every
    /// retarget resets the difficulty to 1.0.
    pub fn next_difficulty(&self, chain: &Blockchain, tip: BlockId, dynamic: bool) -> f64 {
        match self {
            ChainFlavor::Bitcoin {
                retarget_interval,
                target_timespan,
            } => next_difficulty_bitcoin(chain, tip, *retarget_interval, *target_timespan, dynamic),
            ChainFlavor::Ethereum => next_difficulty_ethereum(chain, tip),
        }
    }
}

fn next_difficulty_bitcoin(
    chain: &Blockchain,
    tip: BlockId,
    interval: u64,
    target_timespan: u64,
    dynamic: bool,
) -> f64 {
    let tip = chain.get(tip);
    if tip.height == 0 {
        return 1.0;
    }
    if tip.height % interval != 0 || tip.height < interval {
        return tip.difficulty;
    }

    if !dynamic {
        return 1.0;
    }

    // Ratio of the intended epoch duration to the observed one, limited to
    // a factor of four in either direction.
    let actual = (tip.time - tip.last_epoch_time) as f64;
    let ratio = (target_timespan as f64 / actual).clamp(0.25, 4.0);

    tip.difficulty * ratio
}

fn next_difficulty_ethereum(chain: &Blockchain, tip_id: BlockId) -> f64 {
    let tip = chain.get(tip_id);
    if tip.height == 0 {
        return 1.0;
    }
    let Some(parent_id) = tip.parent else {
        return tip.difficulty;
    };
    let parent = chain.get(parent_id);

    let dt_sec = ((tip.time - parent.time) / 1000) as i64;
    let adjustment = (1 - dt_sec / 10).max(-99);
    let drift = tip.difficulty / 2048.0 * adjustment as f64;
    let uncle_bonus = if has_uncle(chain, tip_id) {
        tip.difficulty / 2048.0
    } else {
        0.0
    };

    (tip.difficulty + drift + uncle_bonus).max(ETHEREUM_MIN_DIFFICULTY)
}

/// True iff a sibling of `block`'s parent exists: another block at the
/// parent's height sharing the parent's parent.
pub fn has_uncle(chain: &Blockchain, block: BlockId) -> bool {
    let Some(parent_id) = chain.get(block).parent else {
        return false;
    };
    let parent = chain.get(parent_id);
    let Some(grandparent_id) = parent.parent else {
        return false;
    };

    chain
        .at_height(parent.height)
        .iter()
        .any(|&id| id != parent_id && chain.get(id).parent == Some(grandparent_id))
}

#[cfg(test)]
mod tests {
    use super::{has_uncle, ChainFlavor};
    use crate::block::{Block, BlockId};
    use crate::blockchain::Blockchain;

    fn insert(
        chain: &mut Blockchain,
        parent: BlockId,
        time: u64,
        difficulty: f64,
        last_epoch_time: u64,
    ) -> BlockId {
        let height = chain.get(parent).height + 1;
        chain.insert(Block {
            height,
            parent: Some(parent),
            minter: Some(0),
            time,
            rand: 0,
            difficulty,
            last_epoch_time,
            finalized: false,
        })
    }

    /// A block planted at an arbitrary height, standing in for the tip of
    /// a long chain.
    fn insert_at_height(
        chain: &mut Blockchain,
        height: u64,
        time: u64,
        difficulty: f64,
        last_epoch_time: u64,
    ) -> BlockId {
        chain.insert(Block {
            height,
            parent: Some(chain.genesis()),
            minter: Some(0),
            time,
            rand: 0,
            difficulty,
            last_epoch_time,
            finalized: false,
        })
    }

    #[test]
    fn bitcoin_genesis_tip_yields_unit_difficulty() {
        let chain = Blockchain::new();
        let flavor = ChainFlavor::bitcoin();
        assert_eq!(flavor.next_difficulty(&chain, chain.genesis(), true), 1.0);
    }

    #[test]
    fn bitcoin_inherits_off_retarget_boundaries() {
        let mut chain = Blockchain::new();
        let genesis = chain.genesis();
        let tip = insert(&mut chain, genesis, 700_000, 2.5, 0);
        let flavor = ChainFlavor::bitcoin();
        assert_eq!(flavor.next_difficulty(&chain, tip, true), 2.5);
    }

    #[test]
    fn bitcoin_retargets_against_the_epoch_duration() {
        let mut chain = Blockchain::new();
        // Epoch completed in half the intended timespan.
        let timespan = 2_016u64 * 600_000;
        let tip = insert_at_height(&mut chain, 2_016, timespan / 2, 1.0, 0);
        let flavor = ChainFlavor::bitcoin();
        assert_eq!(flavor.next_difficulty(&chain, tip, true), 2.0);
    }

    #[test]
    fn bitcoin_retarget_ratio_is_clamped() {
        let mut chain = Blockchain::new();
        // An implausibly fast epoch is limited to a 4x adjustment.
        let tip = insert_at_height(&mut chain, 2_016, 1, 1.0, 0);
        let flavor = ChainFlavor::bitcoin();
        assert_eq!(flavor.next_difficulty(&chain, tip, true), 4.0);
    }

    #[test]
    fn bitcoin_static_mode_resets_to_one_at_boundaries() {
        let mut chain = Blockchain::new();
        let tip = insert_at_height(&mut chain, 2_016, 1, 3.0, 0);
        let flavor = ChainFlavor::bitcoin();
        assert_eq!(flavor.next_difficulty(&chain, tip, false), 1.0);
    }

    #[test]
    fn ethereum_fast_parent_raises_difficulty() {
        let mut chain = Blockchain::new();
        // 5 s parent interval: adjustment factor stays at +1.
        let genesis = chain.genesis();
        let tip = insert(&mut chain, genesis, 5_000, 1.0, 0);
        let flavor = ChainFlavor::ethereum();
        let expected = 1.0 + 1.0 / 2048.0;
        assert!((flavor.next_difficulty(&chain, tip, true) - expected).abs() < 1e-12);
    }

    #[test]
    fn ethereum_adjustment_factor_is_floored() {
        let mut chain = Blockchain::new();
        // An hour-long parent interval bottoms out at -99.
        let genesis = chain.genesis();
        let tip = insert(&mut chain, genesis, 3_600_000, 1.0, 0);
        let flavor = ChainFlavor::ethereum();
        let expected = 1.0 - 99.0 / 2048.0;
        assert!((flavor.next_difficulty(&chain, tip, true) - expected).abs() < 1e-12);
    }

    #[test]
    fn ethereum_difficulty_never_falls_below_minimum() {
        let mut chain = Blockchain::new();
        let genesis = chain.genesis();
        let tip = insert(&mut chain, genesis, 3_600_000, 0.1, 0);
        let flavor = ChainFlavor::ethereum();
        assert_eq!(flavor.next_difficulty(&chain, tip, true), 0.1);
    }

    #[test]
    fn uncle_detection_requires_a_shared_grandparent() {
        let mut chain = Blockchain::new();
        let genesis = chain.genesis();
        let a = insert(&mut chain, genesis, 10_000, 1.0, 0);
        let tip = insert(&mut chain, a, 19_000, 1.0, 0);
        assert!(!has_uncle(&chain, tip));

        // A competing child of genesis makes `a` have a sibling.
        insert(&mut chain, genesis, 11_000, 1.0, 0);
        assert!(has_uncle(&chain, tip));
    }

    #[test]
    fn uncle_bonus_matches_one_part_in_2048() {
        let mut chain = Blockchain::new();
        let genesis = chain.genesis();
        let a = insert(&mut chain, genesis, 10_000, 1.0, 0);
        let tip = insert(&mut chain, a, 19_000, 1.0, 0);
        let flavor = ChainFlavor::ethereum();

        let without = flavor.next_difficulty(&chain, tip, true);
        insert(&mut chain, genesis, 11_000, 1.0, 0);
        let with = flavor.next_difficulty(&chain, tip, true);

        assert!((with - without - 1.0 / 2048.0).abs() < 1e-12);
    }

    #[test]
    fn default_delays_span_the_generation_time() {
        let flavor = ChainFlavor::bitcoin();
        let delays = flavor.default_delays();
        let t = flavor.target_generation_ms();

        assert_eq!(delays.len(), 28);
        assert_eq!(delays[0], t / 10);
        assert!(delays.contains(&t));
        assert!(delays.contains(&(t * 3 / 2)));
        assert_eq!(*delays.last().unwrap(), t * 10);
    }
}
