//! # Allocation Optimizer
//!
//! Two-phase search: `Seed (optional) -> Refine -> Done`.

use tracing::info;

use super::genetic::GeneticSeeder;
use super::refine::PairwiseRefiner;
use super::scorer::AllocationScorer;
use super::types::Allocation;
use super::types::OptimizationOutcome;
use crate::config::AllocatorConfig;
use crate::error::Result;

/// Searches for the highest-scoring allocation for one required return.
pub struct AllocationOptimizer<'a> {
  scorer: &'a AllocationScorer,
  config: &'a AllocatorConfig,
}

impl<'a> AllocationOptimizer<'a> {
  pub fn new(scorer: &'a AllocationScorer, config: &'a AllocatorConfig) -> Self {
    Self { scorer, config }
  }

  /// Run both phases. `required_return` is only recorded on the outcome;
  /// the scorer already carries the per-period requirement.
  pub fn optimize(&self, required_return: f64) -> Result<OptimizationOutcome> {
    let n = self.scorer.n_assets();

    let (start, seed) = if self.config.seed.enabled {
      let (winner, summary) = GeneticSeeder::new(self.scorer, &self.config.seed).run()?;
      let start = winner
        .map(|w| w.allocation().clone())
        .unwrap_or_else(|| Allocation::single(n, 0));
      (start, Some(summary))
    } else {
      (Allocation::single(n, 0), None)
    };

    let refiner = PairwiseRefiner::new(
      self.scorer,
      &self.config.refine,
      self.config.worker_count(),
    )?;
    let (best, refine) = refiner.run(start)?;

    info!(
      required_return,
      breakdown = %best.breakdown(),
      "optimization finished"
    );

    Ok(OptimizationOutcome {
      required_return,
      best,
      seed,
      refine,
    })
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::time::Duration;

  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;

  use super::*;
  use crate::config::MarketConfig;
  use crate::config::RefineConfig;
  use crate::config::SeedConfig;
  use crate::portfolio::asset::Asset;
  use crate::portfolio::market::AlignedMarketMatrix;

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 1, d).unwrap()
  }

  fn fixture_config(seed: bool) -> AllocatorConfig {
    AllocatorConfig {
      market: MarketConfig {
        trading_days_per_year: 261.0,
        min_history_days: 4,
        as_of: day(31),
        conservative_percentile: 0.5,
      },
      seed: SeedConfig {
        enabled: seed,
        min_duration: Duration::ZERO,
        time_budget: Duration::from_secs(30),
        mutation_rate: 0.05,
        rng_seed: Some(3),
      },
      refine: RefineConfig {
        min_trade: 0.00005,
        time_budget: Duration::from_secs(60),
        workers: 2,
      },
    }
  }

  fn fixture_scorer(config: &AllocatorConfig) -> AllocationScorer {
    // Dates deliberately listed newest first.
    let series = |prices: [f64; 9]| {
      prices
        .iter()
        .enumerate()
        .map(|(i, &p)| (day(9 - i as u32), p))
        .collect()
    };
    let assets = vec![
      Asset::new(
        "1".into(),
        series([145.69, 146.25, 147.17, 147.27, 147.41, 146.93, 146.27, 145.78, 144.92]),
        0.0,
      ),
      Asset::new(
        "2".into(),
        series([79.19, 79.18, 79.02, 78.87, 78.89, 79.03, 78.96, 78.79, 78.75]),
        0.0,
      ),
    ];
    let matrix = Arc::new(AlignedMarketMatrix::build(&assets, &config.market).unwrap());
    AllocationScorer::new(matrix, 1.0, &config.market).unwrap()
  }

  #[test]
  fn refinement_converges_on_two_asset_fixture() {
    let config = fixture_config(false);
    let scorer = fixture_scorer(&config);
    let outcome = AllocationOptimizer::new(&scorer, &config)
      .optimize(1.0)
      .unwrap();
    let best = &outcome.best;

    assert!(outcome.seed.is_none());
    assert_abs_diff_eq!(best.weights()[0], 0.481, epsilon = 5e-4);
    assert_abs_diff_eq!(best.weights()[1], 0.519, epsilon = 5e-4);
    assert_abs_diff_eq!(best.average_return(), 1.001, epsilon = 5e-4);
    assert_abs_diff_eq!(best.downside_risk(), 0.001, epsilon = 5e-4);
    assert_abs_diff_eq!(best.downside_correlation(), 0.044, epsilon = 5e-4);
    assert_abs_diff_eq!(best.score(), 16.123, epsilon = 5e-4);
  }

  #[test]
  fn seeded_run_is_no_worse_than_its_seed() {
    let config = fixture_config(true);
    let scorer = fixture_scorer(&config);
    let outcome = AllocationOptimizer::new(&scorer, &config)
      .optimize(1.0)
      .unwrap();

    let seed_best = outcome.seed.as_ref().and_then(|s| s.best_score).unwrap();
    assert!(outcome.best.score() >= seed_best);
    assert!(outcome.best.allocation().is_complete());
  }
}
