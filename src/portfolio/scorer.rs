//! # Allocation Scorer
//!
//! $$
//! S(\mathbf{w}) = \frac{\bar r_p - T}{D_p \cdot \mathbf{w}^\top \rho^{-} \mathbf{w}},
//! \qquad \mathbf{r}_p = C\,\mathbf{w}
//! $$
//!
//! Modified Sortino ratio: downside risk is penalised further by how
//! correlated the holdings are during the periods that fell short.

use std::sync::Arc;

use super::data::downside_correlation;
use super::data::downside_risk;
use super::data::geometric_mean;
use super::data::sortino_score;
use super::market::AlignedMarketMatrix;
use super::types::Allocation;
use super::types::ScoreBreakdown;
use super::types::ScoredAllocation;
use crate::config::MarketConfig;
use crate::error::AllocationError;
use crate::error::Result;

/// Scores allocations against a shared, read-only market matrix.
#[derive(Clone, Debug)]
pub struct AllocationScorer {
  matrix: Arc<AlignedMarketMatrix>,
  required_return: f64,
}

impl AllocationScorer {
  /// Scorer for an annualised multiplicative requirement (e.g. `1.06`),
  /// de-annualised to one matrix period.
  pub fn new(
    matrix: Arc<AlignedMarketMatrix>,
    annual_required_return: f64,
    market: &MarketConfig,
  ) -> Result<Self> {
    if !(annual_required_return.is_finite() && annual_required_return > 0.0) {
      return Err(AllocationError::InvalidInput(format!(
        "required return must be a positive factor, got {annual_required_return}"
      )));
    }
    let per_period = annual_required_return.powf(1.0 / market.trading_days_per_year);
    Self::per_period(matrix, per_period)
  }

  /// Scorer for a requirement already expressed per matrix period.
  pub fn per_period(matrix: Arc<AlignedMarketMatrix>, required_return: f64) -> Result<Self> {
    if !(required_return.is_finite() && required_return > 0.0) {
      return Err(AllocationError::InvalidInput(format!(
        "per-period required return must be positive, got {required_return}"
      )));
    }
    Ok(Self {
      matrix,
      required_return,
    })
  }

  pub fn matrix(&self) -> &AlignedMarketMatrix {
    &self.matrix
  }

  /// Per-period requirement `T`.
  pub fn required_return(&self) -> f64 {
    self.required_return
  }

  pub fn n_assets(&self) -> usize {
    self.matrix.n_assets()
  }

  /// Fully score one allocation.
  pub fn score(&self, allocation: &Allocation) -> Result<ScoredAllocation> {
    allocation.validate(self.matrix.n_assets())?;

    let weights = allocation.to_array();
    let changes = self.matrix.changes();
    let return_path = changes.dot(&weights);
    let path = return_path.as_slice().unwrap_or(&[]);
    let t = self.required_return;

    let average_return = geometric_mean(path);
    let risk = downside_risk(path, t);
    let correlation = downside_correlation(changes, path, t, weights.view())?;
    let score = sortino_score(average_return, t, risk, correlation);

    if !score.is_finite() {
      return Err(AllocationError::DegenerateCorrelation(format!(
        "non-finite score (risk={risk}, correlation={correlation})"
      )));
    }

    Ok(ScoredAllocation::new(
      allocation.clone(),
      return_path,
      ScoreBreakdown {
        average_return,
        downside_risk: risk,
        downside_correlation: correlation,
        score,
      },
    ))
  }

  /// Like [`score`](Self::score), but an unscorable candidate is `None`
  /// instead of an error. Shape errors still propagate.
  pub fn evaluate(&self, allocation: &Allocation) -> Result<Option<ScoredAllocation>> {
    match self.score(allocation) {
      Ok(scored) => Ok(Some(scored)),
      Err(e) if e.is_recoverable() => Ok(None),
      Err(e) => Err(e),
    }
  }
}
