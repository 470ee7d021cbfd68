use std::collections::{HashMap, VecDeque};

use crate::{
    block::{Block, BlockId},
    finality::FINALIZE_DEPTH,
};

/// Number of blocks the store keeps before old entries become eligible for
/// recycling.
pub const RETAIN_BLOCKS: usize = 10_000;

/// Arena-backed store of every block observed during a single simulation
/// run.
///
/// Blocks are owned by the arena and addressed through [`BlockId`] handles,
/// so ancestor steps are O(1) index lookups. Slots of blocks that have
/// fallen out of the retention window are pushed onto a free list and
/// reused by later inserts, which caps memory over long runs.
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    free: Vec<BlockId>,
    /// All live blocks at each height. Supports uncle detection.
    by_height: HashMap<u64, Vec<BlockId>>,
    /// Live blocks in insertion order, oldest first. Genesis is excluded
    /// and never recycled.
    window: VecDeque<BlockId>,
    genesis: BlockId,
}

impl Blockchain {
    /// Creates a new store containing only the genesis block.
    pub fn new() -> Self {
        let genesis = Block::genesis();
        Blockchain {
            blocks: vec![genesis],
            free: Vec::new(),
            by_height: HashMap::from([(0, vec![BlockId(0)])]),
            window: VecDeque::new(),
            genesis: BlockId(0),
        }
    }

    /// Handle of the genesis block.
    #[inline]
    pub fn genesis(&self) -> BlockId {
        self.genesis
    }

    /// Returns a reference to the block behind the given handle.
    #[inline]
    pub fn get(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    /// Returns the parent handle of the given block.
    #[inline]
    pub fn parent_of(&self, id: BlockId) -> Option<BlockId> {
        self.blocks[id.0].parent
    }

    /// All live blocks at the given height.
    #[inline]
    pub fn at_height(&self, height: u64) -> &[BlockId] {
        self.by_height.get(&height).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Marks the given block as finalized.
    #[inline]
    pub fn set_finalized(&mut self, id: BlockId) {
        self.blocks[id.0].finalized = true;
    }

    /// Adds a block to the store, reusing a recycled slot when one is
    /// available, and returns its handle.
    pub fn insert(&mut self, block: Block) -> BlockId {
        let height = block.height;
        let id = match self.free.pop() {
            Some(id) => {
                self.blocks[id.0] = block;
                id
            }
            None => {
                let id = BlockId(self.blocks.len());
                self.blocks.push(block);
                id
            }
        };

        self.by_height.entry(height).or_default().push(id);
        self.window.push_back(id);

        id
    }

    /// True once the retention window has more blocks than
    /// [`RETAIN_BLOCKS`], i.e. [`Blockchain::maintain`] may free some.
    #[inline]
    pub fn over_retention(&self) -> bool {
        self.window.len() > RETAIN_BLOCKS
    }

    /// Recycles the oldest blocks that can no longer be reached by any
    /// fork-choice or finalization walk.
    ///
    /// A block is freed only while the window exceeds [`RETAIN_BLOCKS`] and
    /// the block sits more than [`FINALIZE_DEPTH`] heights below the lowest
    /// node tip, so every handle held by a tip or by an unfinalized
    /// ancestor chain stays live.
    pub fn maintain(&mut self, min_tip_height: u64) {
        let boundary = min_tip_height.saturating_sub(FINALIZE_DEPTH);

        while self.window.len() > RETAIN_BLOCKS {
            let Some(&front) = self.window.front() else {
                break;
            };
            let height = self.blocks[front.0].height;
            if height >= boundary {
                break;
            }

            self.window.pop_front();
            if let Some(ids) = self.by_height.get_mut(&height) {
                ids.retain(|&id| id != front);
                if ids.is_empty() {
                    self.by_height.remove(&height);
                }
            }
            self.free.push(front);
        }
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Blockchain, RETAIN_BLOCKS};
    use crate::block::Block;

    fn child_of(chain: &Blockchain, parent: crate::block::BlockId, time: u64) -> Block {
        let p = *chain.get(parent);
        Block {
            height: p.height + 1,
            parent: Some(parent),
            minter: Some(0),
            time,
            rand: 0,
            difficulty: 1.0,
            last_epoch_time: 0,
            finalized: false,
        }
    }

    #[test]
    fn new_store_holds_genesis() {
        let chain = Blockchain::new();
        let genesis = chain.get(chain.genesis());

        assert_eq!(genesis.height, 0);
        assert!(genesis.finalized);
        assert_eq!(chain.at_height(0).len(), 1);
    }

    #[test]
    fn insert_links_parent_and_height() {
        let mut chain = Blockchain::new();
        let id = chain.insert(child_of(&chain, chain.genesis(), 42));

        assert_eq!(chain.get(id).height, 1);
        assert_eq!(chain.parent_of(id), Some(chain.genesis()));
        assert_eq!(chain.at_height(1), &[id]);
    }

    #[test]
    fn maintain_recycles_blocks_below_the_window() {
        let mut chain = Blockchain::new();
        let mut tip = chain.genesis();
        let extra = 100;
        for t in 0..(RETAIN_BLOCKS + extra) as u64 {
            tip = chain.insert(child_of(&chain, tip, t));
        }

        assert!(chain.over_retention());
        let tip_height = chain.get(tip).height;
        chain.maintain(tip_height);

        assert!(!chain.over_retention());
        assert_eq!(chain.free.len(), extra);
        // Recycled heights are gone from the uncle-detection index.
        assert!(chain.at_height(1).is_empty());
        assert_eq!(chain.at_height(tip_height), &[tip]);

        // A later insert reuses a freed slot instead of growing the arena.
        let len_before = chain.blocks.len();
        chain.insert(child_of(&chain, tip, 0));
        assert_eq!(chain.blocks.len(), len_before);
    }

    #[test]
    fn maintain_keeps_blocks_near_the_lowest_tip() {
        let mut chain = Blockchain::new();
        let mut tip = chain.genesis();
        for t in 0..(RETAIN_BLOCKS + 50) as u64 {
            tip = chain.insert(child_of(&chain, tip, t));
        }

        // A straggler tip at height 10 pins everything above it.
        chain.maintain(10);
        assert!(chain.over_retention());
        assert!(!chain.at_height(10).is_empty());
    }
}
