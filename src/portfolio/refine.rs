//! # Pairwise Trade Refinement
//!
//! Greedy coordinate search on the simplex with a geometrically shrinking
//! step. Each sweep tries moving `trade` of weight from every holding that
//! can afford it to every other asset, keeps the best improving move and
//! halves `trade` when nothing improves. May stall in a local maximum.

use std::time::Instant;

use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;
use rayon::iter::IntoParallelIterator;
use rayon::iter::ParallelIterator;
use tracing::debug;
use tracing::info;

use super::scorer::AllocationScorer;
use super::types::Allocation;
use super::types::RefineSummary;
use super::types::ScoredAllocation;
use super::types::StopReason;
use crate::config::RefineConfig;
use crate::error::AllocationError;
use crate::error::Result;

/// Runs refinement sweeps on a dedicated worker pool.
pub struct PairwiseRefiner<'a> {
  scorer: &'a AllocationScorer,
  config: &'a RefineConfig,
  pool: ThreadPool,
}

impl<'a> PairwiseRefiner<'a> {
  pub fn new(
    scorer: &'a AllocationScorer,
    config: &'a RefineConfig,
    workers: usize,
  ) -> Result<Self> {
    let pool = ThreadPoolBuilder::new()
      .num_threads(workers.max(1))
      .thread_name(|i| format!("refine-{i}"))
      .build()
      .map_err(|e| AllocationError::WorkerPool(e.to_string()))?;
    Ok(Self {
      scorer,
      config,
      pool,
    })
  }

  /// Refine from `start` until the trade amount drops below the minimum or
  /// the time budget is spent.
  pub fn run(&self, start: Allocation) -> Result<(ScoredAllocation, RefineSummary)> {
    let clock = Instant::now();
    let mut best_alloc = start;
    let mut best = self.scorer.evaluate(&best_alloc)?;
    let mut best_score = best.as_ref().map_or(f64::NEG_INFINITY, |s| s.score());

    let mut trade = 1.0;
    let mut sweeps = 0;
    let mut improvements = 0;
    let mut score_history = Vec::new();

    let stop = loop {
      if trade < self.config.min_trade {
        break StopReason::Converged;
      }
      if clock.elapsed() >= self.config.time_budget {
        info!(sweeps, trade, "refine phase time budget exhausted");
        break StopReason::TimeBudget;
      }

      sweeps += 1;
      let candidate = self.sweep(&best_alloc, trade, best_score)?;

      match candidate {
        Some(c) => {
          improvements += 1;
          best_score = c.score();
          best_alloc = c.allocation().clone();
          best = Some(c);
          debug!(improvements, score = best_score, trade, "improved allocation");
        }
        None => {
          trade /= 2.0;
          debug!(trade, "no improving trade, halving trade amount");
        }
      }
      score_history.push(best_score);
    };

    let best = best.ok_or_else(|| {
      AllocationError::DegenerateCorrelation("no scorable allocation was found".into())
    })?;

    info!(sweeps, improvements, score = best.score(), "refine phase finished");

    Ok((
      best,
      RefineSummary {
        sweeps,
        improvements,
        final_trade: trade,
        score_history,
        stop,
      },
    ))
  }

  /// One task per sell asset; results are reduced in sell-index order so the
  /// outcome does not depend on which task finishes first.
  fn sweep(
    &self,
    snapshot: &Allocation,
    trade: f64,
    floor: f64,
  ) -> Result<Option<ScoredAllocation>> {
    let n = snapshot.len();
    let results: Vec<Result<Option<ScoredAllocation>>> = self.pool.install(|| {
      (0..n)
        .into_par_iter()
        .map(|sell| self.best_sale(snapshot, sell, trade, floor))
        .collect()
    });

    let mut best: Option<ScoredAllocation> = None;
    let mut best_score = floor;
    for result in results {
      if let Some(c) = result? {
        if c.score() > best_score {
          best_score = c.score();
          best = Some(c);
        }
      }
    }
    Ok(best)
  }

  /// Best improving move that sells `trade` of asset `sell`.
  fn best_sale(
    &self,
    snapshot: &Allocation,
    sell: usize,
    trade: f64,
    floor: f64,
  ) -> Result<Option<ScoredAllocation>> {
    if snapshot.weights()[sell] < trade {
      return Ok(None);
    }

    let mut best: Option<ScoredAllocation> = None;
    let mut best_score = floor;
    for buy in 0..snapshot.len() {
      if buy == sell {
        continue;
      }
      let candidate = snapshot.with_trade(sell, buy, trade);
      if let Some(scored) = self.scorer.evaluate(&candidate)? {
        if scored.score() > best_score {
          best_score = scored.score();
          best = Some(scored);
        }
      }
    }
    Ok(best)
  }
}
