//! Deferred finalization and round-origination accounting

use tracing::warn;

use crate::{
    block::{BlockId, NodeId},
    blockchain::Blockchain,
};

/// Number of descendant heights required before a block is settled.
pub const FINALIZE_DEPTH: u64 = 144;

/// Number of miners whose per-height wins are tracked individually.
pub const TRACKED_MINERS: usize = 10;

/// Totals over all finalized heights, split by who started the round and
/// who won it. "A" is the advantaged miner, "O" everyone else combined.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FinalityCounters {
    pub started_by_a: u64,
    pub started_by_o: u64,
    pub started_by_a_and_mined_by_a: u64,
    pub started_by_a_and_mined_by_o: u64,
    pub started_by_o_and_mined_by_a: u64,
    pub started_by_o_and_mined_by_o: u64,
}

/// Walks settled chain segments and attributes each finalized height.
///
/// A height is attributed when the chain has grown [`FINALIZE_DEPTH`]
/// blocks past it: the first sighting of a new height triggers a walk from
/// the sighted block down to its 144-deep ancestor, and from there every
/// not-yet-finalized ancestor is marked and classified against the round
/// starter recorded for its height.
#[derive(Debug, Clone)]
pub struct FinalityTracker {
    /// The advantaged miner the A/O split is measured against.
    node_a: NodeId,
    counters: FinalityCounters,
    /// Minter of the first block produced at each height.
    round_started_by: Vec<Option<NodeId>>,
    /// Heights whose finalized block was minted by the advantaged miner.
    a_mined: Vec<bool>,
    /// Same, per tracked miner.
    tracked: Vec<Vec<bool>>,
}

impl FinalityTracker {
    pub fn new(node_a: NodeId, end_round: u64) -> Self {
        let rounds = end_round as usize;
        FinalityTracker {
            node_a,
            counters: FinalityCounters::default(),
            round_started_by: vec![None; rounds],
            a_mined: vec![false; rounds],
            tracked: vec![vec![false; rounds]; TRACKED_MINERS],
        }
    }

    #[inline]
    pub fn counters(&self) -> FinalityCounters {
        self.counters
    }

    /// Minter of the first block observed at `height`, if any yet.
    #[inline]
    pub fn round_starter(&self, height: u64) -> Option<NodeId> {
        self.round_started_by
            .get(height as usize)
            .copied()
            .flatten()
    }

    /// Records the first sighting of `height` and settles the chain
    /// segment that has fallen [`FINALIZE_DEPTH`] blocks behind `block`.
    ///
    /// Later blocks at the same height leave the recorded starter and the
    /// settled segment untouched.
    pub fn observe_height(
        &mut self,
        chain: &mut Blockchain,
        block: BlockId,
        height: u64,
        minter: NodeId,
    ) {
        let slot = height as usize;
        if self.round_started_by[slot].is_some() {
            return;
        }
        self.round_started_by[slot] = Some(minter);

        let target = height.saturating_sub(FINALIZE_DEPTH);
        if target == 0 {
            return;
        }
        if let Some(anchor) = self.descend_to(chain, block, target) {
            self.mark_chain(chain, anchor);
        }
    }

    /// Settles the remaining unfinalized tail below the terminal block.
    pub fn finalize_terminal(&mut self, chain: &mut Blockchain, block: BlockId) {
        self.mark_chain(chain, block);
    }

    /// Steps from `from` towards genesis until reaching height `target`.
    fn descend_to(&self, chain: &Blockchain, from: BlockId, target: u64) -> Option<BlockId> {
        let mut cursor = from;
        while chain.get(cursor).height > target {
            match chain.parent_of(cursor) {
                Some(parent) => cursor = parent,
                None => {
                    warn!(
                        stranded_at = chain.get(cursor).height,
                        target_height = target,
                        "ancestor walk lost its parent before the finalization depth"
                    );
                    return None;
                }
            }
        }
        Some(cursor)
    }

    /// Marks every not-yet-finalized block from `anchor` down and
    /// classifies each against its round starter. Stops at the first
    /// finalized block or at genesis.
    fn mark_chain(&mut self, chain: &mut Blockchain, anchor: BlockId) {
        let mut cursor = anchor;
        loop {
            let block = *chain.get(cursor);
            if block.height == 0 || block.finalized {
                break;
            }
            chain.set_finalized(cursor);
            self.classify(block.height, block.minter);

            match block.parent {
                Some(parent) => cursor = parent,
                None => {
                    warn!(
                        stranded_at = block.height,
                        "finalization walk lost its parent above genesis"
                    );
                    break;
                }
            }
        }
    }

    fn classify(&mut self, height: u64, minter: Option<NodeId>) {
        let Some(starter) = self.round_started_by.get(height as usize).copied() else {
            // The terminal block itself sits one past the last tracked
            // height; it is finalized but not attributed.
            return;
        };

        let mined_by_a = minter == Some(self.node_a);
        let started_by_a = starter == Some(self.node_a);
        match (started_by_a, mined_by_a) {
            (true, true) => {
                self.counters.started_by_a += 1;
                self.counters.started_by_a_and_mined_by_a += 1;
            }
            (true, false) => {
                self.counters.started_by_a += 1;
                self.counters.started_by_a_and_mined_by_o += 1;
            }
            (false, true) => {
                self.counters.started_by_o += 1;
                self.counters.started_by_o_and_mined_by_a += 1;
            }
            (false, false) => {
                self.counters.started_by_o += 1;
                self.counters.started_by_o_and_mined_by_o += 1;
            }
        }

        let slot = height as usize;
        if mined_by_a {
            self.a_mined[slot] = true;
        }
        if let Some(miner) = minter {
            if miner < TRACKED_MINERS {
                self.tracked[miner][slot] = true;
            }
        }
    }

    /// Tears the tracker down into its counters and per-height bitmaps
    /// (advantaged miner first, then one per tracked miner).
    pub fn into_parts(self) -> (FinalityCounters, Vec<bool>, Vec<Vec<bool>>) {
        (self.counters, self.a_mined, self.tracked)
    }
}

#[cfg(test)]
mod tests {
    use super::{FinalityTracker, FINALIZE_DEPTH};
    use crate::block::{Block, BlockId, NodeId};
    use crate::blockchain::Blockchain;

    fn extend(chain: &mut Blockchain, parent: BlockId, minter: NodeId) -> BlockId {
        let height = chain.get(parent).height + 1;
        chain.insert(Block {
            height,
            parent: Some(parent),
            minter: Some(minter),
            time: height * 1_000,
            rand: 0,
            difficulty: 1.0,
            last_epoch_time: 0,
            finalized: false,
        })
    }

    /// Grows a single chain block by block, reporting each new height the
    /// way the kernel does, and returns the tip.
    fn grow(
        chain: &mut Blockchain,
        tracker: &mut FinalityTracker,
        heights: u64,
        minter_of: impl Fn(u64) -> NodeId,
    ) -> BlockId {
        let mut tip = chain.genesis();
        for height in 1..=heights {
            tip = extend(chain, tip, minter_of(height));
            tracker.observe_height(chain, tip, height, minter_of(height));
        }
        tip
    }

    #[test]
    fn settles_heights_beyond_the_finalization_depth() {
        let mut chain = Blockchain::new();
        let mut tracker = FinalityTracker::new(0, 1_000);
        grow(&mut chain, &mut tracker, 200, |height| (height % 2) as NodeId);

        let counters = tracker.counters();
        let settled = 200 - FINALIZE_DEPTH;
        assert_eq!(counters.started_by_a + counters.started_by_o, settled);
        // Single chain: the round starter is always the block's minter.
        assert_eq!(counters.started_by_a, counters.started_by_a_and_mined_by_a);
        assert_eq!(counters.started_by_o, counters.started_by_o_and_mined_by_o);
        assert_eq!(counters.started_by_a_and_mined_by_o, 0);
        assert_eq!(counters.started_by_o_and_mined_by_a, 0);
    }

    #[test]
    fn repeated_heights_do_not_overwrite_the_starter() {
        let mut chain = Blockchain::new();
        let mut tracker = FinalityTracker::new(0, 1_000);
        let tip = grow(&mut chain, &mut tracker, 10, |_| 3);

        let fork = extend(&mut chain, tip, 7);
        tracker.observe_height(&mut chain, fork, 11, 7);
        let late_fork = extend(&mut chain, tip, 8);
        tracker.observe_height(&mut chain, late_fork, 11, 8);

        assert_eq!(tracker.round_starter(11), Some(7));
    }

    #[test]
    fn terminal_walk_settles_the_tail() {
        let end_round = 300;
        let mut chain = Blockchain::new();
        let mut tracker = FinalityTracker::new(0, end_round);
        let mut tip = chain.genesis();
        for height in 1..end_round {
            tip = extend(&mut chain, tip, 0);
            tracker.observe_height(&mut chain, tip, height, 0);
        }
        let terminal = extend(&mut chain, tip, 0);
        tracker.finalize_terminal(&mut chain, terminal);

        let counters = tracker.counters();
        assert_eq!(counters.started_by_a, end_round - 1);
        assert_eq!(counters.started_by_o, 0);
        // The terminal block is settled but sits past the tracked heights.
        assert!(chain.get(terminal).finalized);
        assert_eq!(
            counters.started_by_a_and_mined_by_a + counters.started_by_a_and_mined_by_o,
            counters.started_by_a
        );
    }

    #[test]
    fn blocks_are_classified_at_most_once() {
        let mut chain = Blockchain::new();
        let mut tracker = FinalityTracker::new(0, 1_000);
        let tip = grow(&mut chain, &mut tracker, 200, |_| 0);
        let before = tracker.counters();

        // Re-walking an already settled segment changes nothing.
        tracker.finalize_terminal(&mut chain, tip);
        let after = tracker.counters();
        assert_eq!(
            before.started_by_a + FINALIZE_DEPTH,
            after.started_by_a
        );
        tracker.finalize_terminal(&mut chain, tip);
        assert_eq!(after, tracker.counters());
    }
}
