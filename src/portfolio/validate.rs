//! # Validation
//!
//! $$
//! N_{\text{tickers}} \ge k_{\min}, \qquad N_{\text{rows}} \ge n_{\min}
//! $$
//!
//! Precondition checks shared by every strategy.

use super::data::PriceMatrix;
use super::error::StrategyError;
use super::error::StrategyResult;

/// Fail with [`StrategyError::InsufficientData`] when `prices` has fewer than
/// `min_tickers` columns or fewer than `min_rows` rows.
pub fn validate(prices: &PriceMatrix, min_tickers: usize, min_rows: usize) -> StrategyResult<()> {
  if prices.n_tickers() < min_tickers {
    return Err(StrategyError::InsufficientData(format!(
      "need at least {min_tickers} tickers, got {}",
      prices.n_tickers()
    )));
  }
  if prices.n_rows() < min_rows {
    return Err(StrategyError::InsufficientData(format!(
      "need at least {min_rows} rows of history, got {}",
      prices.n_rows()
    )));
  }
  Ok(())
}

/// A trailing window must be non-empty and strictly shorter than the history.
pub fn validate_window(window: usize, rows: usize, what: &str) -> StrategyResult<()> {
  if window == 0 {
    return Err(StrategyError::Parameter(format!("{what} must be at least 1")));
  }
  if window >= rows {
    return Err(StrategyError::Parameter(format!(
      "{what} ({window} rows) is too large for the price history ({rows} rows)"
    )));
  }
  Ok(())
}

pub fn validate_risk_free(rate: f64) -> StrategyResult<()> {
  if !rate.is_finite() {
    return Err(StrategyError::Parameter(format!(
      "risk-free rate must be finite, got {rate}"
    )));
  }
  Ok(())
}
