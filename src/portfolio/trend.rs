//! # GTAA Trend Filter
//!
//! $$
//! \text{MA}_i = \frac{1}{W} \sum_{k=0}^{W-1} P_{T-k,i}, \qquad
//! s_i = \mathbb 1\{P_{T,i} > \text{MA}_i\}
//! $$
//!
//! Tactical allocation that holds, in equal weight, every asset trading above
//! its trailing moving average.

use impl_new_derive::ImplNew;
use ndarray::ArrayView1;
use ndarray::s;
use tracing::debug;
use tracing::warn;

use super::data::PriceMatrix;
use super::data::SectorMap;
use super::engine::AllocationStrategy;
use super::error::StrategyError;
use super::error::StrategyResult;
use super::momentum::equal_weights;
use super::types::Allocation;
use super::types::Diagnostics;
use super::types::StrategyKind;
use super::types::TrendDiagnostics;
use super::validate::validate;
use super::validate::validate_window;

/// Trading days per calendar month.
pub const TRADING_DAYS_PER_MONTH: usize = 21;

#[derive(ImplNew, Clone, Copy, Debug, PartialEq, Eq)]
pub struct GtaaConfig {
  /// Moving average length in months.
  pub ma_months: usize,
}

impl Default for GtaaConfig {
  fn default() -> Self {
    Self { ma_months: 10 }
  }
}

impl GtaaConfig {
  /// Moving average length in rows, `None` on overflow.
  pub fn window(&self) -> Option<usize> {
    self.ma_months.checked_mul(TRADING_DAYS_PER_MONTH)
  }
}

#[derive(Clone, Debug, Default)]
pub struct Gtaa {
  config: GtaaConfig,
}

impl Gtaa {
  pub fn new(config: GtaaConfig) -> Self {
    Self { config }
  }

  pub fn config(&self) -> &GtaaConfig {
    &self.config
  }
}

/// Mean of the last `window` prices, `None` if any of them is missing.
pub fn trailing_moving_average(column: ArrayView1<'_, f64>, window: usize) -> Option<f64> {
  if window == 0 || window > column.len() {
    return None;
  }

  let tail = column.slice(s![column.len() - window..]);
  if tail.iter().any(|p| p.is_nan()) {
    return None;
  }
  Some(tail.sum() / window as f64)
}

impl AllocationStrategy for Gtaa {
  fn kind(&self) -> StrategyKind {
    StrategyKind::Gtaa
  }

  fn run(&self, prices: &PriceMatrix, _sectors: Option<&SectorMap>) -> StrategyResult<Allocation> {
    validate(prices, 1, 1)?;
    let window = self.config.window().ok_or_else(|| {
      StrategyError::Parameter(format!(
        "{} months do not fit a trading-day window",
        self.config.ma_months
      ))
    })?;
    validate_window(window, prices.n_rows(), "moving average window")?;

    let values = prices.values();
    let moving_averages: Vec<Option<f64>> = (0..prices.n_tickers())
      .map(|col| trailing_moving_average(values.column(col), window))
      .collect();
    let latest_prices = prices.last_row().to_vec();
    let signals: Vec<bool> = latest_prices
      .iter()
      .zip(&moving_averages)
      .map(|(p, ma)| ma.is_some_and(|ma| *p > ma))
      .collect();

    let members: Vec<usize> = (0..signals.len()).filter(|&i| signals[i]).collect();
    let diagnostics = Diagnostics::Trend(TrendDiagnostics {
      window,
      signals,
      latest_prices,
      moving_averages,
    });

    if members.is_empty() {
      warn!(window, "no asset above its moving average, holding no positions");
      return Ok(Allocation::empty(
        self.kind(),
        prices.tickers().to_vec(),
        diagnostics,
      ));
    }

    debug!(window, holdings = members.len(), "trend signals evaluated");
    Ok(Allocation::new(
      self.kind(),
      prices.tickers().to_vec(),
      equal_weights(prices.n_tickers(), &members),
      diagnostics,
    ))
  }
}
