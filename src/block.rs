//! Definitions for blocks

/// Numeric type of each mining node's unique identifier.
pub type NodeId = usize;

/// A block as observed by the simulation kernel.
///
/// Blocks form a tree rooted at the genesis block; only ancestry is ever
/// traversed. `parent` and `minter` are `None` exactly for genesis.
#[derive(Debug, Clone, Copy)]
pub struct Block {
    /// Distance from genesis.
    pub height: u64,
    /// Handle of the parent block in the owning
    /// [`Blockchain`](crate::blockchain::Blockchain).
    pub parent: Option<BlockId>,
    /// Node that minted this block.
    pub minter: Option<NodeId>,
    /// Virtual time of generation, in milliseconds.
    pub time: u64,
    /// Uniform tiebreaker drawn once at generation, from `[0, i64::MAX - 10]`.
    pub rand: u64,
    /// Difficulty this block was mined at.
    pub difficulty: f64,
    /// Start time of the retarget epoch this block belongs to.
    pub last_epoch_time: u64,
    /// Whether the deferred finalization pass has settled this block.
    pub finalized: bool,
}

impl Block {
    /// The pre-finalized root of every chain.
    pub fn genesis() -> Self {
        Block {
            height: 0,
            parent: None,
            minter: None,
            time: 0,
            rand: 0,
            difficulty: 1.0,
            last_epoch_time: 0,
            finalized: true,
        }
    }
}

/// Stable handle of a [`Block`] within its owning block store.
///
/// Handles are arena indices; a handle stays valid as long as the block is
/// inside the store's retention window.
#[repr(transparent)]
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub usize);

impl From<usize> for BlockId {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}
