//! Aggregated data produced by a delay sweep

use std::fmt::Display;

use crate::finality::FinalityCounters;

/// Fairness metrics of one simulation run at a fixed propagation delay.
///
/// `pi_a`/`pi_o` are the fractions of rounds started by the advantaged
/// miner / by anyone else; `w_a`/`w_o` the conditional probabilities that
/// the advantaged miner wins a round of each class; `r_a` the resulting
/// effective mining share.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaResult {
    /// Propagation delay of the run, in milliseconds.
    pub delay: u64,
    pub pi_a: f64,
    pub pi_o: f64,
    pub w_a: f64,
    pub w_o: f64,
    pub r_a: f64,
    /// Mean time between block generation events, in milliseconds.
    pub avg_block_interval: f64,
}

/// Complete record of one simulation run: the finalization counters plus
/// the per-height win bitmaps behind the cumulative share curves.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub delay: u64,
    pub end_round: u64,
    pub counters: FinalityCounters,
    pub avg_block_interval: f64,
    /// Highest block height reached when the run stopped.
    pub final_height: u64,
    /// Virtual time when the run stopped, in milliseconds.
    pub final_time: u64,
    a_mined: Vec<bool>,
    tracked: Vec<Vec<bool>>,
}

impl RunRecord {
    pub(super) fn new(
        delay: u64,
        end_round: u64,
        counters: FinalityCounters,
        avg_block_interval: f64,
        final_height: u64,
        final_time: u64,
        a_mined: Vec<bool>,
        tracked: Vec<Vec<bool>>,
    ) -> Self {
        RunRecord {
            delay,
            end_round,
            counters,
            avg_block_interval,
            final_height,
            final_time,
            a_mined,
            tracked,
        }
    }

    /// The fairness metrics of this run. Zero denominators yield 0.0 for
    /// the affected conditional probability.
    pub fn result(&self) -> DeltaResult {
        let c = &self.counters;
        let rounds = self.end_round as f64;

        let pi_a = c.started_by_a as f64 / rounds;
        let pi_o = c.started_by_o as f64 / rounds;
        let w_a = if c.started_by_a > 0 {
            c.started_by_a_and_mined_by_a as f64 / c.started_by_a as f64
        } else {
            0.0
        };
        let w_o = if c.started_by_o > 0 {
            c.started_by_o_and_mined_by_a as f64 / c.started_by_o as f64
        } else {
            0.0
        };

        DeltaResult {
            delay: self.delay,
            pi_a,
            pi_o,
            w_a,
            w_o,
            r_a: pi_a * w_a + pi_o * w_o,
            avg_block_interval: self.avg_block_interval,
        }
    }

    /// Cumulative share of heights won by the advantaged miner, one point
    /// per height.
    pub fn share_curve(&self) -> ShareCurve<'_> {
        ShareCurve::new(&self.a_mined)
    }

    /// One cumulative share curve per tracked miner, in miner order.
    pub fn miner_share_curves(&self) -> impl Iterator<Item = ShareCurve<'_>> {
        self.tracked.iter().map(|mined| ShareCurve::new(mined))
    }
}

/// Iterator of `(height, cumulative share)` points over a per-height win
/// bitmap.
#[derive(Debug, Clone)]
pub struct ShareCurve<'a> {
    mined: &'a [bool],
    next: usize,
    wins: u64,
}

impl<'a> ShareCurve<'a> {
    fn new(mined: &'a [bool]) -> Self {
        ShareCurve {
            mined,
            next: 0,
            wins: 0,
        }
    }
}

impl Iterator for ShareCurve<'_> {
    type Item = (u64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        let height = self.next;
        let &won = self.mined.get(height)?;
        self.next += 1;
        if won {
            self.wins += 1;
        }

        Some((height as u64, self.wins as f64 / (height + 1) as f64))
    }
}

/// The outcome of a whole delay sweep, in sweep order.
///
/// The [`Display`] implementation renders the summary table as CSV with a
/// `delay,pi_A,pi_O,w_A,w_O,avg_block_interval` header.
#[derive(Debug, Clone)]
pub struct SweepResults {
    pub flavor_name: &'static str,
    pub node_count: usize,
    pub end_round: u64,
    pub rule_name: &'static str,
    pub difficulty_name: &'static str,
    runs: Vec<RunRecord>,
}

impl SweepResults {
    pub(super) fn new(
        flavor_name: &'static str,
        node_count: usize,
        end_round: u64,
        rule_name: &'static str,
        difficulty_name: &'static str,
        runs: Vec<RunRecord>,
    ) -> Self {
        SweepResults {
            flavor_name,
            node_count,
            end_round,
            rule_name,
            difficulty_name,
            runs,
        }
    }

    #[inline]
    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    /// The per-delay fairness metrics, in sweep order.
    pub fn results(&self) -> Vec<DeltaResult> {
        self.runs.iter().map(RunRecord::result).collect()
    }
}

impl Display for SweepResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "delay,pi_A,pi_O,w_A,w_O,avg_block_interval")?;
        for run in &self.runs {
            let r = run.result();
            writeln!(
                f,
                "{},{},{},{},{},{}",
                r.delay, r.pi_a, r.pi_o, r.w_a, r.w_o, r.avg_block_interval
            )?;
        }

        Ok(())
    }
}
