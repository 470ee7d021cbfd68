//! Fork-choice rules for equal-height ties

use crate::block::{Block, NodeId};

/// Policy a node applies when a delivered block competes with its current
/// tip at the same height.
///
/// Longer chains always win regardless of the rule, and a node never drops
/// a tip it minted itself on a tie.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TieRule {
    /// Keep whichever block was seen first.
    #[default]
    FirstSeen,
    /// Adopt the candidate iff its random tiebreaker is smaller.
    Random,
    /// Adopt the candidate iff it was generated later.
    LastGenerated,
}

impl TieRule {
    /// Rule name as used in output file names.
    pub fn rule_name(&self) -> &'static str {
        match self {
            TieRule::FirstSeen => "first_seen",
            TieRule::Random => "random",
            TieRule::LastGenerated => "last_generated",
        }
    }

    /// Whether node `node` replaces its `tip` with `candidate`.
    ///
    /// The caller guarantees `candidate` and `tip` are distinct blocks.
    pub fn adopts(&self, candidate: &Block, tip: &Block, node: NodeId) -> bool {
        if candidate.height > tip.height {
            return true;
        }

        if candidate.height == tip.height && tip.minter != Some(node) {
            return match self {
                TieRule::FirstSeen => false,
                TieRule::Random => candidate.rand < tip.rand,
                TieRule::LastGenerated => candidate.time > tip.time,
            };
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::TieRule;
    use crate::block::Block;

    fn block(height: u64, minter: usize, time: u64, rand: u64) -> Block {
        Block {
            height,
            parent: None,
            minter: Some(minter),
            time,
            rand,
            difficulty: 1.0,
            last_epoch_time: 0,
            finalized: false,
        }
    }

    #[test]
    fn longer_chains_win_under_every_rule() {
        let candidate = block(5, 1, 100, 9);
        let tip = block(4, 2, 50, 1);
        for rule in [TieRule::FirstSeen, TieRule::Random, TieRule::LastGenerated] {
            assert!(rule.adopts(&candidate, &tip, 0));
        }
    }

    #[test]
    fn shorter_chains_never_win() {
        let candidate = block(3, 1, 100, 0);
        let tip = block(4, 2, 50, 1);
        for rule in [TieRule::FirstSeen, TieRule::Random, TieRule::LastGenerated] {
            assert!(!rule.adopts(&candidate, &tip, 0));
        }
    }

    #[test]
    fn first_seen_keeps_the_tip_on_ties() {
        let candidate = block(4, 1, 100, 0);
        let tip = block(4, 2, 50, 1);
        assert!(!TieRule::FirstSeen.adopts(&candidate, &tip, 0));
    }

    #[test]
    fn random_rule_compares_tiebreakers() {
        let tip = block(4, 2, 50, 500);
        assert!(TieRule::Random.adopts(&block(4, 1, 100, 499), &tip, 0));
        assert!(!TieRule::Random.adopts(&block(4, 1, 100, 501), &tip, 0));
    }

    #[test]
    fn last_generated_rule_compares_times() {
        let tip = block(4, 2, 50, 0);
        assert!(TieRule::LastGenerated.adopts(&block(4, 1, 51, 0), &tip, 0));
        assert!(!TieRule::LastGenerated.adopts(&block(4, 1, 49, 0), &tip, 0));
    }

    #[test]
    fn self_minted_tips_survive_ties() {
        let node = 2;
        let tip = block(4, node, 50, 500);
        let candidate = block(4, 1, 100, 1);
        assert!(!TieRule::Random.adopts(&candidate, &tip, node));
        assert!(!TieRule::LastGenerated.adopts(&candidate, &tip, node));
    }
}
