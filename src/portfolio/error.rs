//! # Errors
//!
//! $$
//! \mathcal{S}(P) \in \text{Allocation} \cup \\{\text{InsufficientData}, \text{Parameter}, \text{Optimization}\\}
//! $$
//!
//! Every failure is recoverable at the call boundary; strategies never return
//! partial results.

use thiserror::Error;

/// Failure of the quadratic-program solve or of its inputs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizationError {
  #[error("solver did not converge within {iterations} iterations")]
  NotConverged { iterations: usize },

  #[error("problem is infeasible: {0}")]
  Infeasible(String),

  #[error("covariance matrix is not positive semi-definite (min eigenvalue {min_eigenvalue:e})")]
  NotPositiveSemiDefinite { min_eigenvalue: f64 },

  #[error("KKT system is singular")]
  SingularSystem,
}

/// Error returned by every strategy, estimator and validator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
  /// Not enough rows or tickers for the requested computation.
  #[error("insufficient data: {0}")]
  InsufficientData(String),

  /// Parameter outside its valid range.
  #[error("invalid parameter: {0}")]
  Parameter(String),

  #[error("optimization failed: {0}")]
  Optimization(#[from] OptimizationError),

  /// Price or sector data violating the data-model invariants.
  #[error("invalid input data: {0}")]
  InvalidData(String),

  /// Weights violating the allocation invariant.
  #[error("allocation violates weight invariant: {0}")]
  InvalidAllocation(String),
}

pub type StrategyResult<T> = Result<T, StrategyError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn optimization_errors_convert_into_strategy_errors() {
    let err: StrategyError = OptimizationError::NotConverged { iterations: 7 }.into();
    assert_eq!(
      err.to_string(),
      "optimization failed: solver did not converge within 7 iterations"
    );
  }
}
