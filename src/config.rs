//! # Configuration
//!
//! Explicit run configuration threaded through model, matrix and search.
//! Nothing here is global, so parallel workers and concurrent tests each
//! carry their own copy.

use std::time::Duration;

use chrono::Local;
use chrono::NaiveDate;

use crate::error::AllocationError;
use crate::error::Result;

/// Trading days assumed per calendar year.
pub const DEFAULT_TRADING_DAYS_PER_YEAR: f64 = 261.0;

/// Settings that gate per-asset modelling and matrix alignment.
#[derive(Clone, Debug, PartialEq)]
pub struct MarketConfig {
  /// Periods per year used to annualise daily figures.
  pub trading_days_per_year: f64,
  /// Assets with fewer price observations are dropped before alignment.
  pub min_history_days: usize,
  /// Dates after this cutoff are ignored.
  pub as_of: NaiveDate,
  /// Percentile used for the conservative annual return estimate.
  pub conservative_percentile: f64,
}

impl Default for MarketConfig {
  fn default() -> Self {
    Self {
      trading_days_per_year: DEFAULT_TRADING_DAYS_PER_YEAR,
      min_history_days: DEFAULT_TRADING_DAYS_PER_YEAR as usize * 14,
      as_of: Local::now().date_naive(),
      conservative_percentile: 0.5,
    }
  }
}

/// Genetic seeding phase settings.
#[derive(Clone, Debug, PartialEq)]
pub struct SeedConfig {
  /// Run the stochastic seeding phase before refinement.
  pub enabled: bool,
  /// Generations continue at least this long (and until `N²` evaluations).
  pub min_duration: Duration,
  /// Hard wall-clock cap for the phase.
  pub time_budget: Duration,
  /// Per-gene probability of replacing an inherited weight with a fresh one.
  pub mutation_rate: f64,
  /// Fixed RNG seed for reproducible runs.
  pub rng_seed: Option<u64>,
}

impl Default for SeedConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      min_duration: Duration::from_secs(5),
      time_budget: Duration::from_secs(120),
      mutation_rate: 0.05,
      rng_seed: None,
    }
  }
}

/// Pairwise-trade refinement settings.
#[derive(Clone, Debug, PartialEq)]
pub struct RefineConfig {
  /// Search stops once the trade amount halves below this.
  pub min_trade: f64,
  /// Hard wall-clock cap for the phase.
  pub time_budget: Duration,
  /// Worker threads per sweep; `0` uses the available hardware parallelism.
  pub workers: usize,
}

impl Default for RefineConfig {
  fn default() -> Self {
    Self {
      min_trade: 0.00005,
      time_budget: Duration::from_secs(600),
      workers: 0,
    }
  }
}

/// Complete configuration for an allocation run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AllocatorConfig {
  pub market: MarketConfig,
  pub seed: SeedConfig,
  pub refine: RefineConfig,
}

impl AllocatorConfig {
  /// Reject out-of-range settings before any data is touched.
  pub fn validate(&self) -> Result<()> {
    let m = &self.market;
    if !(m.trading_days_per_year.is_finite() && m.trading_days_per_year > 0.0) {
      return Err(AllocationError::InvalidInput(format!(
        "trading_days_per_year must be positive, got {}",
        m.trading_days_per_year
      )));
    }
    if m.min_history_days < 2 {
      return Err(AllocationError::InvalidInput(
        "min_history_days must be at least 2".into(),
      ));
    }
    if !(m.conservative_percentile > 0.0 && m.conservative_percentile < 1.0) {
      return Err(AllocationError::InvalidInput(format!(
        "conservative_percentile must be in (0, 1), got {}",
        m.conservative_percentile
      )));
    }
    if !(0.0..=1.0).contains(&self.seed.mutation_rate) {
      return Err(AllocationError::InvalidInput(format!(
        "mutation_rate must be in [0, 1], got {}",
        self.seed.mutation_rate
      )));
    }
    if !(self.refine.min_trade > 0.0 && self.refine.min_trade <= 1.0) {
      return Err(AllocationError::InvalidInput(format!(
        "min_trade must be in (0, 1], got {}",
        self.refine.min_trade
      )));
    }
    Ok(())
  }

  /// Refinement workers, never more than the hardware offers; `0` means
  /// all of it.
  pub fn worker_count(&self) -> usize {
    let available = std::thread::available_parallelism()
      .map(|n| n.get())
      .unwrap_or(1);
    match self.refine.workers {
      0 => available,
      n => n.min(available),
    }
  }
}
