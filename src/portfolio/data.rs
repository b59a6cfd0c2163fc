//! # Portfolio Data Utilities
//!
//! $$
//! D = \sqrt{\tfrac{1}{n}\sum_t \min(r_t - T, 0)^2}
//! $$
//!
//! Return-path statistics and correlation helpers used by the scorer.

use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;
use statrs::statistics::Statistics;

use crate::error::AllocationError;
use crate::error::Result;

/// Smallest `wᵀ ρ w` accepted as a score denominator. Below this the
/// exposure is rounding noise from a rank-deficient correlation matrix.
pub const MIN_DOWNSIDE_CORRELATION: f64 = 1e-12;

/// Geometric mean of multiplicative returns.
pub fn geometric_mean(xs: &[f64]) -> f64 {
  xs.iter().geometric_mean()
}

/// Bessel-corrected standard deviation.
pub fn sample_std(xs: &[f64]) -> f64 {
  xs.iter().std_dev()
}

/// Root-mean-square shortfall of `path` below `required`, averaged over every
/// period. Periods at or above the requirement contribute zero.
pub fn downside_risk(path: &[f64], required: f64) -> f64 {
  if path.is_empty() {
    return 0.0;
  }

  let acc: f64 = path
    .iter()
    .map(|&r| {
      let d = (r - required).min(0.0);
      d * d
    })
    .sum();
  (acc / path.len() as f64).sqrt()
}

/// Portfolio correlation exposure `wᵀ ρ w` over the periods where `path`
/// fell short of `required`.
///
/// `changes` is laid out with periods as rows and assets as columns.
pub fn downside_correlation(
  changes: ArrayView2<f64>,
  path: &[f64],
  required: f64,
  weights: ArrayView1<f64>,
) -> Result<f64> {
  let down: Vec<usize> = path
    .iter()
    .enumerate()
    .filter(|&(_, &r)| r < required)
    .map(|(t, _)| t)
    .collect();

  if down.len() < 2 {
    return Err(AllocationError::DegenerateCorrelation(format!(
      "{} underperforming period(s), need at least 2",
      down.len()
    )));
  }

  let subset = changes.select(Axis(0), &down);
  let corr = subset
    .t()
    .pearson_correlation()
    .map_err(|e| AllocationError::DegenerateCorrelation(e.to_string()))?;

  if corr.iter().any(|c| !c.is_finite()) {
    return Err(AllocationError::DegenerateCorrelation(
      "constant asset return over underperforming periods".into(),
    ));
  }

  let exposure = weights.dot(&corr.dot(&weights));
  if !(exposure > MIN_DOWNSIDE_CORRELATION) {
    return Err(AllocationError::DegenerateCorrelation(format!(
      "downside correlation {exposure:e} is not positive"
    )));
  }
  Ok(exposure)
}

/// Modified Sortino ratio with the downside-correlation penalty.
pub fn sortino_score(
  average_return: f64,
  required: f64,
  downside_risk: f64,
  downside_correlation: f64,
) -> f64 {
  (average_return - required) / (downside_risk * downside_correlation)
}

/// Population covariance (divisor `n`) of the columns of `changes`.
pub fn covariance_matrix(changes: ArrayView2<f64>) -> Array2<f64> {
  let n = changes.ncols();
  if changes.nrows() == 0 {
    return Array2::zeros((n, n));
  }
  changes
    .t()
    .cov(0.0)
    .unwrap_or_else(|_| Array2::zeros((n, n)))
}

/// Scale weights to sum to one; `None` when they sum to zero.
pub fn normalize(weights: &[f64]) -> Option<Vec<f64>> {
  let total: f64 = weights.iter().sum();
  if !(total > 0.0) || !total.is_finite() {
    return None;
  }
  Some(weights.iter().map(|w| w / total).collect())
}
