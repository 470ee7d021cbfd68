/*!
Re-export of common values and datatypes used for configuring and running
simulations. Must be imported manually.

```
use nakamoto_sim::prelude::*;
```
*/

use crate::{
    block, blockchain, difficulty, event, finality, power_dist, simulation, tie_breaker,
};

pub use block::{Block, BlockId, NodeId};

pub use blockchain::Blockchain;

pub use difficulty::ChainFlavor;

pub use event::{Event, EventKind, EventQueue};

pub use finality::{FinalityCounters, FinalityTracker, FINALIZE_DEPTH, TRACKED_MINERS};

pub use power_dist::{Hashrate, HashrateDistribution, HashrateDistributionError};

pub use simulation::{
    DeltaResult, RunRecord, ShareCurve, Simulation, SimulationBuildError, SimulationBuilder,
    SweepResults,
};

pub use tie_breaker::TieRule;
