//! Describing distributions of mining hash rate

use crate::block::NodeId;

/// Numeric type used to represent a node's hash rate.
pub type Hashrate = f64;

/// Hash rates of the ten dominant real-world mining pools, in percent of
/// network hash rate. The remainder is split evenly across further nodes.
pub const MEASURED_HASHRATES: [Hashrate; 10] = [
    27.9383, 15.3179, 12.4277, 10.9827, 8.47784, 4.62428, 4.04624, 3.85356, 2.40848, 1.92678,
];

/// Determines how hash rate is distributed between the simulated nodes.
///
/// Unlike a probability distribution, hash rates are free positive weights;
/// only their ratios matter to the mining scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum HashrateDistribution {
    /// Weight each node equally.
    Equal,
    /// Give node 0 `share` percent of the total, with the remainder split
    /// evenly between all other nodes.
    Dominant { share: Hashrate },
    /// The skewed [`MEASURED_HASHRATES`] pool distribution, with the
    /// remaining percentage split evenly across nodes past the tenth.
    Measured,
    /// Set all hash rates to those in the given vector.
    Values(Vec<Hashrate>),
}

impl Default for HashrateDistribution {
    fn default() -> Self {
        HashrateDistribution::Dominant { share: 30.0 }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HashrateDistributionError {
    #[error("cannot create a distribution for zero nodes")]
    ZeroNodesGiven,
    #[error("dominant share {0} is not in the open range 0..100")]
    BadDominantShare(Hashrate),
    #[error("a dominant share requires at least two nodes")]
    DominantSingleNode,
    #[error("hash rate {0} is not positive and finite")]
    BadHashrate(Hashrate),
    #[error("the measured distribution requires at least 10 nodes, got {0}")]
    TooFewMeasuredNodes(usize),
    #[error("distribution size {0} does not match node count {1}")]
    WrongNumNodes(usize, usize),
}

impl HashrateDistribution {
    /// Checks that this distribution is well-formed over `num_nodes`.
    pub fn validate(&self, num_nodes: usize) -> Result<(), HashrateDistributionError> {
        use HashrateDistributionError::*;

        if num_nodes == 0 {
            return Err(ZeroNodesGiven);
        }

        match self {
            Self::Equal => Ok(()),
            Self::Dominant { share } => {
                if num_nodes == 1 {
                    return Err(DominantSingleNode);
                }
                if !share.is_finite() || *share <= 0.0 || *share >= 100.0 {
                    return Err(BadDominantShare(*share));
                }
                Ok(())
            }
            Self::Measured => {
                if num_nodes < MEASURED_HASHRATES.len() {
                    return Err(TooFewMeasuredNodes(num_nodes));
                }
                Ok(())
            }
            Self::Values(values) => {
                if values.len() != num_nodes {
                    return Err(WrongNumNodes(values.len(), num_nodes));
                }
                if let Some(&bad) = values.iter().find(|v| !v.is_finite() || **v <= 0.0) {
                    return Err(BadHashrate(bad));
                }
                Ok(())
            }
        }
    }

    /// Returns the per-node hash rates described by this distribution, or
    /// an error if it is not well-formed over `num_nodes`.
    pub fn values(&self, num_nodes: usize) -> Result<Vec<Hashrate>, HashrateDistributionError> {
        self.validate(num_nodes)?;

        Ok(match self {
            Self::Equal => vec![1.0; num_nodes],
            Self::Dominant { share } => {
                let other = (100.0 - share) / (num_nodes - 1) as Hashrate;
                let mut values = vec![other; num_nodes];
                values[0] = *share;
                values
            }
            Self::Measured => {
                let mut values = MEASURED_HASHRATES.to_vec();
                let rest = num_nodes - values.len();
                if rest > 0 {
                    let consumed: Hashrate = values.iter().sum();
                    values.extend(std::iter::repeat((100.0 - consumed) / rest as Hashrate).take(rest));
                }
                values
            }
            Self::Values(values) => values.clone(),
        })
    }

    /// Index of the node holding the largest hash rate: the "advantaged"
    /// miner the fairness metrics are measured against.
    pub fn advantaged_node(values: &[Hashrate]) -> NodeId {
        values
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(node, _)| node)
            .unwrap_or(0)
    }
}
