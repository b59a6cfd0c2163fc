//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}} \frac{\bar R_p-T}{D_p\,\rho^{-}_p}
//! $$
//!
//! Allocation vectors, scored results and search diagnostics.

use std::fmt;

use ndarray::Array1;

use super::data::normalize;
use crate::error::AllocationError;
use crate::error::Result;

/// Tolerance for a finished allocation summing to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Weights per asset in the matrix's canonical column order.
#[derive(Clone, Debug, PartialEq)]
pub struct Allocation {
  weights: Vec<f64>,
}

impl Allocation {
  /// Wrap raw weights without validation.
  pub fn from_weights(weights: Vec<f64>) -> Self {
    Self { weights }
  }

  /// 100% in the asset at `index`.
  pub fn single(n: usize, index: usize) -> Self {
    let mut weights = vec![0.0; n];
    if let Some(w) = weights.get_mut(index) {
      *w = 1.0;
    }
    Self { weights }
  }

  /// Renormalised copy of `weights`, or `None` if they sum to zero.
  pub fn normalized(weights: &[f64]) -> Option<Self> {
    normalize(weights).map(Self::from_weights)
  }

  pub fn weights(&self) -> &[f64] {
    &self.weights
  }

  pub fn len(&self) -> usize {
    self.weights.len()
  }

  pub fn is_empty(&self) -> bool {
    self.weights.is_empty()
  }

  pub fn sum(&self) -> f64 {
    self.weights.iter().sum()
  }

  /// Copy with `amount` of weight moved from `sell` to `buy`.
  pub fn with_trade(&self, sell: usize, buy: usize, amount: f64) -> Self {
    let mut weights = self.weights.clone();
    weights[sell] -= amount;
    weights[buy] += amount;
    Self { weights }
  }

  /// Check length and sign before scoring.
  pub fn validate(&self, n_assets: usize) -> Result<()> {
    if self.weights.len() != n_assets {
      return Err(AllocationError::InvalidAllocation(format!(
        "expected {} weights, got {}",
        n_assets,
        self.weights.len()
      )));
    }
    if let Some((i, w)) = self
      .weights
      .iter()
      .enumerate()
      .find(|(_, w)| !w.is_finite() || **w < 0.0)
    {
      return Err(AllocationError::InvalidAllocation(format!(
        "weight {i} is {w}, weights must be finite and non-negative"
      )));
    }
    if !(self.sum() > 0.0) {
      return Err(AllocationError::InvalidAllocation(
        "weights sum to zero".into(),
      ));
    }
    Ok(())
  }

  /// Whether the weights sum to one within [`WEIGHT_SUM_TOLERANCE`].
  pub fn is_complete(&self) -> bool {
    (self.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE && self.weights.iter().all(|&w| w >= 0.0)
  }

  pub(crate) fn to_array(&self) -> Array1<f64> {
    Array1::from(self.weights.clone())
  }
}

/// Score components for one candidate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreBreakdown {
  /// Geometric mean of the realised per-period return path.
  pub average_return: f64,
  /// Root-mean-square shortfall below the per-period requirement.
  pub downside_risk: f64,
  /// `wᵀ ρ w` over underperforming periods.
  pub downside_correlation: f64,
  /// `(average_return - T) / (downside_risk * downside_correlation)`.
  pub score: f64,
}

impl fmt::Display for ScoreBreakdown {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "score={:.6} avg={:.6} risk={:.6} corr={:.6}",
      self.score, self.average_return, self.downside_risk, self.downside_correlation
    )
  }
}

/// An allocation evaluated against the market matrix.
///
/// Built in one step by the scorer; there is no partially scored state.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredAllocation {
  allocation: Allocation,
  return_path: Array1<f64>,
  breakdown: ScoreBreakdown,
}

impl ScoredAllocation {
  pub(crate) fn new(
    allocation: Allocation,
    return_path: Array1<f64>,
    breakdown: ScoreBreakdown,
  ) -> Self {
    Self {
      allocation,
      return_path,
      breakdown,
    }
  }

  pub fn allocation(&self) -> &Allocation {
    &self.allocation
  }

  pub fn weights(&self) -> &[f64] {
    self.allocation.weights()
  }

  /// Realised return of the allocation for every aligned period.
  pub fn return_path(&self) -> &Array1<f64> {
    &self.return_path
  }

  pub fn breakdown(&self) -> ScoreBreakdown {
    self.breakdown
  }

  pub fn average_return(&self) -> f64 {
    self.breakdown.average_return
  }

  pub fn downside_risk(&self) -> f64 {
    self.breakdown.downside_risk
  }

  pub fn downside_correlation(&self) -> f64 {
    self.breakdown.downside_correlation
  }

  pub fn score(&self) -> f64 {
    self.breakdown.score
  }
}

/// Why a search phase stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
  /// Stopping criterion reached (evaluation target or minimum trade size).
  Converged,
  /// Wall-clock budget ran out; best-so-far is returned.
  TimeBudget,
}

/// Diagnostics for the genetic seeding phase.
#[derive(Clone, Debug, PartialEq)]
pub struct SeedSummary {
  pub evaluations: usize,
  pub generations: usize,
  pub best_score: Option<f64>,
  pub stop: StopReason,
}

/// Diagnostics for the pairwise refinement phase.
#[derive(Clone, Debug, PartialEq)]
pub struct RefineSummary {
  pub sweeps: usize,
  pub improvements: usize,
  pub final_trade: f64,
  /// Best score after each sweep.
  pub score_history: Vec<f64>,
  pub stop: StopReason,
}

/// Output of a full optimizer run.
#[derive(Clone, Debug)]
pub struct OptimizationOutcome {
  /// Annualised required return the run optimised for.
  pub required_return: f64,
  pub best: ScoredAllocation,
  pub seed: Option<SeedSummary>,
  pub refine: RefineSummary,
}
