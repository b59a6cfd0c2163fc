//! # Allocation Engine
//!
//! $$
//! \mathbf{w}^\* = \operatorname{Optimize}(C, T)
//! $$
//!
//! High-level entry point: assets in, aligned matrix, optimized allocation
//! and report out.

use std::sync::Arc;

use rayon::iter::IntoParallelRefIterator;
use rayon::iter::ParallelIterator;
use tracing::warn;

use super::asset::Asset;
use super::market::AlignedMarketMatrix;
use super::market::MatrixCache;
use super::optimizer::AllocationOptimizer;
use super::report::AllocationReport;
use super::report::AssetSummary;
use super::report::asset_summaries;
use super::scorer::AllocationScorer;
use super::types::Allocation;
use super::types::OptimizationOutcome;
use super::types::ScoredAllocation;
use crate::config::AllocatorConfig;
use crate::error::Result;

/// Single entry-point engine for allocation workflows.
#[derive(Debug)]
pub struct AllocationEngine {
  config: AllocatorConfig,
  cache: MatrixCache,
}

impl AllocationEngine {
  /// Construct a new engine; the configuration is validated up front.
  pub fn new(config: AllocatorConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self {
      config,
      cache: MatrixCache::new(),
    })
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &AllocatorConfig {
    &self.config
  }

  /// Aligned matrix for `assets`, reused across calls with the same key.
  pub fn market_matrix(&mut self, assets: &[Asset]) -> Result<Arc<AlignedMarketMatrix>> {
    self.cache.get_or_build(assets, &self.config.market)
  }

  /// Per-asset return statistics in canonical order.
  pub fn summarize(&self, assets: &[Asset]) -> Result<Vec<AssetSummary>> {
    asset_summaries(assets, &self.config.market)
  }

  /// Scorer for an annualised requirement against `matrix`.
  pub fn scorer(
    &self,
    matrix: Arc<AlignedMarketMatrix>,
    required_return: f64,
  ) -> Result<AllocationScorer> {
    AllocationScorer::new(matrix, required_return, &self.config.market)
  }

  /// Score an existing allocation, e.g. current holdings.
  pub fn evaluate(
    &self,
    matrix: Arc<AlignedMarketMatrix>,
    allocation: &Allocation,
    required_return: f64,
  ) -> Result<ScoredAllocation> {
    self.scorer(matrix, required_return)?.score(allocation)
  }

  /// Optimize for one annualised required return.
  pub fn optimize(
    &self,
    matrix: Arc<AlignedMarketMatrix>,
    required_return: f64,
  ) -> Result<OptimizationOutcome> {
    let scorer = self.scorer(matrix, required_return)?;
    AllocationOptimizer::new(&scorer, &self.config).optimize(required_return)
  }

  /// Optimize independently for each required return. Results keep the
  /// input order; one failure does not abort the others.
  pub fn optimize_sweep(
    &self,
    matrix: Arc<AlignedMarketMatrix>,
    required_returns: &[f64],
  ) -> Vec<Result<OptimizationOutcome>> {
    required_returns
      .par_iter()
      .map(|&r| {
        let outcome = self.optimize(Arc::clone(&matrix), r);
        if let Err(e) = &outcome {
          warn!(required_return = r, error = %e, "optimization failed");
        }
        outcome
      })
      .collect()
  }

  /// Assets in, sorted report out.
  pub fn run(&mut self, assets: &[Asset], required_return: f64) -> Result<AllocationReport> {
    let matrix = self.market_matrix(assets)?;
    let outcome = self.optimize(Arc::clone(&matrix), required_return)?;
    AllocationReport::new(matrix.tickers(), &outcome.best)
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use approx::assert_abs_diff_eq;
  use chrono::NaiveDate;

  use super::*;
  use crate::config::MarketConfig;
  use crate::error::AllocationError;
  use crate::portfolio::data::MIN_DOWNSIDE_CORRELATION;

  fn config() -> AllocatorConfig {
    let mut cfg = AllocatorConfig {
      market: MarketConfig {
        trading_days_per_year: 1.0,
        min_history_days: 5,
        as_of: NaiveDate::from_ymd_opt(2018, 12, 31).unwrap(),
        conservative_percentile: 0.5,
      },
      ..Default::default()
    };
    cfg.seed.enabled = false;
    cfg.refine.time_budget = Duration::from_secs(30);
    cfg.refine.workers = 2;
    cfg
  }

  fn assets() -> Vec<Asset> {
    let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
    let series = |prices: &[f64]| {
      prices
        .iter()
        .enumerate()
        .map(|(i, &p)| (start + chrono::Days::new(i as u64), p))
        .collect()
    };
    vec![
      Asset::new("VTI".into(), series(&[100.0, 101.0, 100.5, 102.0, 101.2, 103.0]), 0.0003),
      Asset::new("BND".into(), series(&[50.0, 50.1, 50.2, 50.1, 50.3, 50.2]), 0.0004),
      Asset::new("GLD".into(), series(&[80.0, 79.0, 80.5, 81.0, 80.2, 81.5]), 0.004),
      Asset::new("NEW".into(), series(&[10.0, 10.5]), 0.0),
    ]
  }

  #[test]
  fn run_produces_sorted_complete_report() {
    let mut engine = AllocationEngine::new(config()).unwrap();
    let report = engine.run(&assets(), 1.004).unwrap();

    let rows = report.rows();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.ticker != "NEW"));
    assert!(rows.windows(2).all(|w| w[0].weight >= w[1].weight));
    let total: f64 = rows.iter().map(|r| r.weight).sum();
    assert!((total - 1.0).abs() < 1e-6);
  }

  #[test]
  fn sweep_keeps_input_order() {
    let mut engine = AllocationEngine::new(config()).unwrap();
    let matrix = engine.market_matrix(&assets()).unwrap();
    let targets = [1.002, 1.004];
    let results = engine.optimize_sweep(matrix, &targets);
    assert_eq!(results.len(), 2);
    for (r, target) in results.iter().zip(targets) {
      let outcome = r.as_ref().unwrap();
      assert_eq!(outcome.required_return, target);
      assert!(outcome.best.score().is_finite());
      assert!(outcome.best.downside_correlation() > MIN_DOWNSIDE_CORRELATION);
      assert!(outcome.best.allocation().is_complete());
    }
  }

  #[test]
  fn matrix_is_cached_per_key() {
    let mut engine = AllocationEngine::new(config()).unwrap();
    let a = engine.market_matrix(&assets()).unwrap();
    let b = engine.market_matrix(&assets()).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
  }

  #[test]
  fn invalid_config_is_rejected() {
    let mut cfg = config();
    cfg.market.trading_days_per_year = 0.0;
    assert!(matches!(
      AllocationEngine::new(cfg),
      Err(AllocationError::InvalidInput(_))
    ));
  }

  #[test]
  fn evaluate_scores_current_holdings() {
    let mut engine = AllocationEngine::new(config()).unwrap();
    let matrix = engine.market_matrix(&assets()).unwrap();
    let holdings = matrix
      .allocation_from_pairs([("VTI", 0.6), ("BND", 0.4)])
      .unwrap();
    assert_eq!(holdings.weights(), &[0.4, 0.0, 0.6]);

    let scored = engine.evaluate(matrix, &holdings, 1.004).unwrap();
    assert_eq!(scored.weights(), holdings.weights());
    assert_eq!(scored.return_path().len(), 5);
    assert_abs_diff_eq!(scored.return_path()[0], 1.00645788, epsilon = 1e-9);
    assert_abs_diff_eq!(scored.downside_correlation(), 0.04, epsilon = 1e-9);
    assert_abs_diff_eq!(scored.score(), -2.5153810855877143, epsilon = 1e-6);
  }
}
