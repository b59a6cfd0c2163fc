//! # Errors
//!
//! Failure taxonomy shared by model construction, scoring and search.

use thiserror::Error;

/// Errors raised by the allocation engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
  /// Too few assets or too few observations to build a model or matrix.
  #[error("insufficient data: {0}")]
  InsufficientData(String),

  /// Fewer than two underperforming periods, or a non-finite correlation
  /// estimate over those periods.
  #[error("degenerate downside correlation: {0}")]
  DegenerateCorrelation(String),

  /// Weight vector does not fit the canonical asset ordering or holds
  /// negative / non-finite weights.
  #[error("invalid allocation: {0}")]
  InvalidAllocation(String),

  /// Out-of-range configuration or argument.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// Worker pool for the refinement sweep could not be created.
  #[error("worker pool error: {0}")]
  WorkerPool(String),
}

impl AllocationError {
  /// Numerical degeneracies are absorbed by the search; everything else is fatal.
  pub fn is_recoverable(&self) -> bool {
    matches!(self, Self::DegenerateCorrelation(_))
  }
}

/// Result alias for allocation operations.
pub type Result<T> = std::result::Result<T, AllocationError>;
